//! Building massing records, style/roof/material enums and coding tables.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::parcels::{Density, ZoneType};

/// Architectural style. Wire coding is the discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Style {
    Victorian = 0,
    ArtDeco = 1,
    Modern = 2,
    Brutalist = 3,
    Postmodern = 4,
    Contemporary = 5,
    Futuristic = 6,
}

impl Style {
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Base and roof share of the vertical tripartite split, in percent,
    /// before jitter. The body takes the remainder.
    pub const fn split_ratios(self) -> (f64, f64) {
        match self {
            Style::Victorian => (0.15, 0.20),
            Style::ArtDeco => (0.20, 0.15),
            Style::Modern | Style::Contemporary => (0.10, 0.05),
            Style::Brutalist => (0.08, 0.03),
            Style::Postmodern => (0.12, 0.10),
            Style::Futuristic => (0.05, 0.08),
        }
    }
}

/// Roof construction. Wire coding is the discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoofType {
    Flat = 0,
    Gable = 1,
    Hip = 2,
    Mansard = 3,
    Pyramid = 4,
    Barrel = 5,
    Sawtooth = 6,
    Green = 7,
}

impl RoofType {
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Vertical slice of a massing. Dispatch for geometry and materials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Base,
    Body,
    Roof,
    Detail,
}

/// Face material codes carried in the mesh buffer, one per triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Material {
    Brick = 0,
    Concrete = 1,
    Stucco = 2,
    Glass = 3,
    Steel = 4,
    Wood = 5,
    Stone = 6,
    Shingle = 7,
    Metal = 8,
    Greenery = 9,
    Asphalt = 10,
}

impl Material {
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Fixed material table indexed by zone, style, component and roof type.
/// Residential bodies always land in {brick, concrete, stucco}.
pub fn material_for(zone: ZoneType, style: Style, kind: ComponentKind, roof: RoofType) -> Material {
    match kind {
        ComponentKind::Base => match zone {
            ZoneType::Industrial => Material::Concrete,
            ZoneType::Commercial => match style {
                Style::Victorian => Material::Stone,
                Style::Brutalist => Material::Concrete,
                _ => Material::Glass,
            },
            ZoneType::Residential | ZoneType::None => match style {
                Style::Victorian => Material::Stone,
                Style::Modern | Style::Contemporary => Material::Concrete,
                _ => Material::Brick,
            },
        },
        ComponentKind::Body => match zone {
            ZoneType::Industrial => match style {
                Style::Futuristic => Material::Steel,
                _ => Material::Concrete,
            },
            ZoneType::Commercial => match style {
                Style::Victorian => Material::Brick,
                Style::ArtDeco => Material::Stucco,
                Style::Brutalist => Material::Concrete,
                Style::Postmodern => Material::Steel,
                Style::Modern | Style::Contemporary | Style::Futuristic => Material::Glass,
            },
            ZoneType::Residential | ZoneType::None => match style {
                Style::Victorian => Material::Brick,
                Style::ArtDeco | Style::Postmodern => Material::Stucco,
                Style::Modern | Style::Brutalist | Style::Contemporary | Style::Futuristic => {
                    Material::Concrete
                }
            },
        },
        ComponentKind::Roof => match roof {
            RoofType::Flat => Material::Asphalt,
            RoofType::Green => Material::Greenery,
            RoofType::Gable | RoofType::Hip | RoofType::Mansard | RoofType::Pyramid => {
                Material::Shingle
            }
            RoofType::Barrel | RoofType::Sawtooth => Material::Metal,
        },
        ComponentKind::Detail => Material::Steel,
    }
}

/// Mesh resolution: full detail, mid, extruded-box only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lod {
    Full = 0,
    Mid = 1,
    Box = 2,
}

impl Lod {
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Lod::Full),
            1 => Some(Lod::Mid),
            2 => Some(Lod::Box),
            _ => None,
        }
    }
}

/// One building volume over a parcel footprint.
#[derive(Debug, Clone)]
pub struct BuildingMassing {
    pub id: u32,
    pub parcel: u32,
    /// Parcel polygon offset inward by the setback, CCW.
    pub footprint: Vec<DVec2>,
    pub total_height: f64,
    pub base_h: f64,
    pub body_h: f64,
    pub roof_h: f64,
    /// max(1, round(body / 3 m)).
    pub floors: u32,
    pub style: Style,
    pub roof: RoofType,
    /// RNG seed the massing was drawn from; reproduces it exactly.
    pub seed: u32,
    pub zone: ZoneType,
    pub density: Density,
    /// Upgrade level, 1-based.
    pub level: u32,
}
