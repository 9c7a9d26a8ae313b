//! Request/reply vocabulary of the core.
//!
//! External collaborators (UI, renderer, simulation) enqueue `Request`
//! values and receive `Reply` values; nothing else crosses the boundary.
//! Bulk payloads ride in flat typed buffers (see `buffers`); mesh buffers
//! are moved into the reply and not retained by the core.

use glam::DVec2;

use crate::layout::Era;
use crate::massing::{BuildingMassing, Lod, MeshData};
use crate::parcels::{Density, SubdivisionMethod, ZoneType};
use crate::roads::RoadClass;

/// Structured failure carried in replies. No panicking path exists for
/// ordinary input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// Edge insertion refused by the minimum-angle invariant.
    AngleTooAcute,
    /// Offset or clipping collapsed a polygon below 3 vertices.
    DegenerateGeometry,
    /// Zone paint overlapped no block; the virtual-block path applies.
    EmptyIntersection,
    /// Coordinate outside the planning area.
    OutOfBounds,
    /// No parcel within reach of the queried position.
    IndexMiss,
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::AngleTooAcute => write!(f, "edge angle below minimum"),
            CoreError::DegenerateGeometry => write!(f, "degenerate geometry"),
            CoreError::EmptyIntersection => write!(f, "no intersecting block"),
            CoreError::OutOfBounds => write!(f, "coordinate outside planning area"),
            CoreError::IndexMiss => write!(f, "no parcel near position"),
        }
    }
}

impl std::error::Error for CoreError {}

/// Simulation event that triggers a massing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnEvent {
    Spawn,
    Upgrade,
}

/// A zone paint: polygon, zoning and the subdivision strategy.
#[derive(Debug, Clone)]
pub struct ZoneRequest {
    pub polygon: Vec<DVec2>,
    pub zone: ZoneType,
    pub density: Density,
    pub method: Option<SubdivisionMethod>,
}

#[derive(Debug, Clone)]
pub enum Request {
    /// Initialize RNG and optionally run the procedural layout.
    Boot { seed: u32, era: Era },
    /// Rebuild the city from a new seed.
    ShuffleSeed { seed: u32 },
    /// Re-run the layout for a new era.
    SetEra { era: Era },
    /// Weld one painted segment into the graph.
    PaintRoad {
        start: DVec2,
        end: DVec2,
        class: RoadClass,
    },
    GetRoads,
    PaintZone(ZoneRequest),
    GetParcels,
    GetBlocks,
    /// Drop all parcels and massings; rebuild blocks.
    ClearZones,
    /// Spawn or upgrade one building near a position.
    GenerateBuildingForZone {
        zone_id: u32,
        position: DVec2,
        level: u32,
        event: SpawnEvent,
    },
    /// Bulk massing for every zoned parcel.
    GenerateBuildings { lod: Option<Lod> },
    GetBuildingMesh { building: u32, lod: Lod },
    SetBuildingLod { lod: Lod },
    /// Zone paint immediately followed by bulk massing.
    RegenerateWithZone {
        zone: ZoneRequest,
        lod: Option<Lod>,
    },
}

/// Intersection summary rows for road replies.
#[derive(Debug, Clone)]
pub struct IntersectionInfo {
    pub position: DVec2,
    pub segment_count: u32,
    /// end 2, T 3, cross 4, complex >= 5 (the incidence count itself).
    pub kind: &'static str,
    pub orientation: f64,
    pub radius: f64,
}

/// Parcel reply payload: stride-9 headers plus stride-2 vertex stream
/// with a separator vertex between parcels.
#[derive(Debug, Clone, Default)]
pub struct ParcelBuffers {
    pub headers: Vec<f32>,
    pub vertices: Vec<f32>,
}

#[derive(Debug)]
pub enum Reply {
    RoadsGenerated {
        /// Stride 6: startX, startY, endX, endY, width, classCode.
        segments: Vec<f32>,
        intersections: Vec<IntersectionInfo>,
    },
    RoadPainted {
        success: bool,
        error: Option<CoreError>,
        segments: Vec<f32>,
        intersections: Vec<IntersectionInfo>,
    },
    ZonePainted {
        affected_parcels: Vec<u32>,
        parcels: ParcelBuffers,
        /// Stride 4: id, area, perimeter, parcelCount.
        blocks: Vec<f32>,
        emitted: usize,
        dropped: usize,
        error: Option<CoreError>,
    },
    Parcels(ParcelBuffers),
    Blocks {
        headers: Vec<f32>,
    },
    ZonesCleared {
        blocks: usize,
    },
    BuildingSpawned {
        parcel: Option<u32>,
        building: Option<BuildingMassing>,
        mesh: Option<MeshData>,
        lod: Lod,
        error: Option<CoreError>,
    },
    BuildingsGenerated {
        emitted: usize,
        dropped: usize,
        lod: Lod,
    },
    BuildingMesh {
        building: u32,
        lod: Lod,
        mesh: Option<MeshData>,
        error: Option<CoreError>,
    },
    LodSet {
        lod: Lod,
    },
}
