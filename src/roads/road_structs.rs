//! Core road-network records and identifiers.
//!
//! IDs are monotonically increasing and never reused; topology records are
//! disabled, not deleted, so ids stay stable across welder splits.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Stable, monotonically increasing node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for NodeId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<NodeId> for u32 {
    #[inline]
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// Stable, monotonically increasing edge identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EdgeId(pub u32);

impl EdgeId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for EdgeId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<EdgeId> for u32 {
    #[inline]
    fn from(id: EdgeId) -> Self {
        id.0
    }
}

/// Functional class of a road segment. Order matters: the wire coding is
/// the discriminant (highway 0, avenue 1, street 2, local 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadClass {
    Highway = 0,
    Avenue = 1,
    Street = 2,
    Local = 3,
}

impl RoadClass {
    /// Nominal paved width in meters.
    #[inline]
    pub const fn width(self) -> f64 {
        match self {
            RoadClass::Highway => 24.0,
            RoadClass::Avenue => 16.0,
            RoadClass::Street => 12.0,
            RoadClass::Local => 8.0,
        }
    }

    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(RoadClass::Highway),
            1 => Some(RoadClass::Avenue),
            2 => Some(RoadClass::Street),
            3 => Some(RoadClass::Local),
            _ => None,
        }
    }
}

/// Paving material, derived from era and class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadMaterial {
    Dirt = 0,
    Cobblestone = 1,
    Asphalt = 2,
    Concrete = 3,
}

impl RoadMaterial {
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// A junction or endpoint of the road network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadNode {
    pub position: DVec2,
    /// Incident edge ids, in attachment order.
    pub edges: Vec<EdgeId>,
    /// True iff two or more enabled edges meet here.
    pub is_intersection: bool,
    pub enabled: bool,
}

impl RoadNode {
    pub fn new(position: DVec2) -> Self {
        Self {
            position,
            edges: Vec::new(),
            is_intersection: false,
            enabled: true,
        }
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.edges.len()
    }
}

/// A straight road segment between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadEdge {
    pub a: NodeId,
    pub b: NodeId,
    pub class: RoadClass,
    pub material: RoadMaterial,
    pub width: f64,
    /// Cached Euclidean length, updated on endpoint rewires.
    pub length: f64,
    pub enabled: bool,
}

impl RoadEdge {
    /// The endpoint opposite `node`, if `node` is an endpoint at all.
    #[inline]
    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if self.a == node {
            Some(self.b)
        } else if self.b == node {
            Some(self.a)
        } else {
            None
        }
    }

    #[inline]
    pub fn connects(&self, x: NodeId, y: NodeId) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }
}

/// Why an edge insertion was refused. No partial mutation accompanies a
/// rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRejection {
    /// Zero-length input: both endpoints resolve to the same node.
    Degenerate,
    /// The new edge would meet an existing edge at a node below the
    /// minimum separation angle.
    AngleTooAcute,
}

impl std::fmt::Display for EdgeRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeRejection::Degenerate => write!(f, "degenerate edge"),
            EdgeRejection::AngleTooAcute => write!(f, "angle below minimum at endpoint"),
        }
    }
}
