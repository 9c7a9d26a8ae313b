//! Land parcels and zoning parameters.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::blocks::BlockId;
use crate::roads::EdgeId;

/// Zone category. Wire coding is the discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneType {
    Residential = 0,
    Commercial = 1,
    Industrial = 2,
    None = 3,
}

impl ZoneType {
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ZoneType::Residential),
            1 => Some(ZoneType::Commercial),
            2 => Some(ZoneType::Industrial),
            3 => Some(ZoneType::None),
            _ => None,
        }
    }

    /// Parcel frontage width band for this zone (m).
    pub const fn width_range(self) -> (f64, f64) {
        match self {
            ZoneType::Residential => (12.0, 20.0),
            ZoneType::Commercial => (15.0, 30.0),
            ZoneType::Industrial => (25.0, 50.0),
            ZoneType::None => (15.0, 25.0),
        }
    }
}

/// Development intensity. Wire coding is the discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl Density {
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Density::Low),
            1 => Some(Density::Medium),
            2 => Some(Density::High),
            _ => None,
        }
    }

    /// Narrower parcels at higher density.
    pub const fn width_multiplier(self) -> f64 {
        match self {
            Density::Low => 1.0,
            Density::Medium => 0.85,
            Density::High => 0.7,
        }
    }

    /// Deeper parcels at lower density.
    pub const fn depth_multiplier(self) -> f64 {
        match self {
            Density::Low => 2.0,
            Density::Medium => 1.5,
            Density::High => 1.0,
        }
    }

    /// Building setback band from the parcel boundary (m).
    pub const fn setback_range(self) -> (f64, f64) {
        match self {
            Density::Low => (4.0, 6.0),
            Density::Medium => (2.0, 4.0),
            Density::High => (1.0, 2.0),
        }
    }

    /// Building height band (m).
    pub const fn height_range(self) -> (f64, f64) {
        match self {
            Density::Low => (3.0, 6.0),
            Density::Medium => (9.0, 15.0),
            Density::High => (18.0, 60.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Parcel {
    pub id: u32,
    /// Simple CCW ring, >= 3 vertices, inside its block up to tolerance.
    pub polygon: Vec<DVec2>,
    pub zone: ZoneType,
    pub density: Density,
    pub area: f64,
    /// Total boundary length coincident with road-adjacent block edges.
    pub frontage: f64,
    /// Road edge providing the frontage, if one matched.
    pub frontage_edge: Option<EdgeId>,
    /// Frontage spans two or more distinct block edges.
    pub is_corner: bool,
    pub centroid: DVec2,
    pub block: BlockId,
}
