//! Historical eras and the tables they index: road materials, road width
//! evolution, and the style/roof pools the massing generator draws from.

use serde::{Deserialize, Serialize};

use crate::massing::{RoofType, Style};
use crate::roads::{RoadClass, RoadMaterial};

/// Decade tag the whole pipeline is parameterized by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Era {
    #[serde(rename = "1890s")]
    Y1890s,
    #[serde(rename = "1910s")]
    Y1910s,
    #[serde(rename = "1930s")]
    Y1930s,
    #[serde(rename = "1950s")]
    Y1950s,
    #[serde(rename = "1970s")]
    Y1970s,
    #[serde(rename = "1990s")]
    Y1990s,
    #[serde(rename = "2010s")]
    Y2010s,
    #[serde(rename = "2030s")]
    Y2030s,
}

impl Era {
    pub const ALL: [Era; 8] = [
        Era::Y1890s,
        Era::Y1910s,
        Era::Y1930s,
        Era::Y1950s,
        Era::Y1970s,
        Era::Y1990s,
        Era::Y2010s,
        Era::Y2030s,
    ];

    /// Decade start year.
    #[inline]
    pub const fn year(self) -> i32 {
        match self {
            Era::Y1890s => 1890,
            Era::Y1910s => 1910,
            Era::Y1930s => 1930,
            Era::Y1950s => 1950,
            Era::Y1970s => 1970,
            Era::Y1990s => 1990,
            Era::Y2010s => 2010,
            Era::Y2030s => 2030,
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Era::ALL.iter().copied().find(|e| e.tag() == tag)
    }

    pub const fn tag(self) -> &'static str {
        match self {
            Era::Y1890s => "1890s",
            Era::Y1910s => "1910s",
            Era::Y1930s => "1930s",
            Era::Y1950s => "1950s",
            Era::Y1970s => "1970s",
            Era::Y1990s => "1990s",
            Era::Y2010s => "2010s",
            Era::Y2030s => "2030s",
        }
    }

    /// Paving by era and class.
    pub fn material_for(self, class: RoadClass) -> RoadMaterial {
        let y = self.year();
        if y <= 1900 {
            RoadMaterial::Dirt
        } else if y <= 1930 {
            match class {
                RoadClass::Highway | RoadClass::Avenue => RoadMaterial::Cobblestone,
                _ => RoadMaterial::Dirt,
            }
        } else if y <= 1950 {
            match class {
                RoadClass::Local => RoadMaterial::Dirt,
                _ => RoadMaterial::Cobblestone,
            }
        } else if y <= 1990 {
            match class {
                RoadClass::Local => RoadMaterial::Cobblestone,
                _ => RoadMaterial::Asphalt,
            }
        } else {
            match class {
                RoadClass::Highway => RoadMaterial::Concrete,
                _ => RoadMaterial::Asphalt,
            }
        }
    }

    /// Width evolution: narrow early streets, generous modern ones.
    pub fn width_factor(self) -> f64 {
        let y = self.year();
        if y < 1920 {
            0.8
        } else if y > 1960 {
            1.1
        } else {
            1.0
        }
    }

    /// How many urban centers the layout seeds.
    pub fn center_count(self) -> usize {
        match self.year() {
            y if y <= 1910 => 1,
            y if y <= 1950 => 2,
            _ => 3,
        }
    }

    /// Development intensity factor for radial road counts.
    pub fn density_factor(self) -> f64 {
        match self.year() {
            y if y <= 1910 => 0.3,
            y if y <= 1950 => 0.5,
            _ => 0.8,
        }
    }

    /// Streets promoted to avenues during evolution, post-1950 only.
    pub fn avenue_upgrade_share(self) -> f64 {
        if self.year() > 1950 {
            0.2
        } else {
            0.0
        }
    }

    /// Architectural styles current in this era.
    pub fn styles(self) -> &'static [Style] {
        match self {
            Era::Y1890s => &[Style::Victorian],
            Era::Y1910s => &[Style::Victorian, Style::ArtDeco],
            Era::Y1930s => &[Style::ArtDeco],
            Era::Y1950s | Era::Y1970s => &[Style::Modern, Style::Brutalist],
            Era::Y1990s => &[Style::Postmodern, Style::Contemporary],
            Era::Y2010s => &[Style::Modern, Style::Contemporary],
            Era::Y2030s => &[Style::Contemporary, Style::Futuristic],
        }
    }

    /// Roof pool; repeats weight the draw toward the era's dominant form.
    pub fn roofs(self) -> &'static [RoofType] {
        match self {
            Era::Y1890s => &[RoofType::Gable, RoofType::Hip, RoofType::Mansard],
            Era::Y1910s => &[
                RoofType::Gable,
                RoofType::Hip,
                RoofType::Mansard,
                RoofType::Pyramid,
            ],
            Era::Y1930s => &[
                RoofType::Flat,
                RoofType::Mansard,
                RoofType::Barrel,
                RoofType::Gable,
            ],
            Era::Y1950s => &[
                RoofType::Flat,
                RoofType::Gable,
                RoofType::Hip,
                RoofType::Barrel,
            ],
            Era::Y1970s => &[RoofType::Flat, RoofType::Flat, RoofType::Hip],
            Era::Y1990s => &[
                RoofType::Flat,
                RoofType::Flat,
                RoofType::Hip,
                RoofType::Pyramid,
            ],
            Era::Y2010s => &[
                RoofType::Flat,
                RoofType::Flat,
                RoofType::Green,
                RoofType::Hip,
            ],
            Era::Y2030s => &[
                RoofType::Flat,
                RoofType::Green,
                RoofType::Green,
                RoofType::Barrel,
            ],
        }
    }
}
