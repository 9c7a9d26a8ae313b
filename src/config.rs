use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::layout::era::Era;

/// Geometric tolerances used by the kernel, graph and welder.
///
/// Every epsilon the pipeline depends on lives here so hosts can tune them;
/// defaults are the values the rest of the crate is calibrated against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tolerances {
    /// |denominator| below which two segments count as parallel.
    pub parallel_eps: f64,
    /// Distance within which a parcel edge counts as lying on a block edge (m).
    pub edge_overlap: f64,
    /// Parameter epsilon for line-intersection range tests.
    pub line_t_eps: f64,
    /// New node positions within this distance reuse the existing node (m).
    pub snap_threshold: f64,
    /// Crossings closer than this to a segment endpoint are not split (m).
    pub intersection_eps: f64,
    /// Minimum angle between edges sharing a node (radians).
    pub min_angle: f64,
    /// Generated grid edges keep this clearance from existing nodes (m).
    pub min_road_separation: f64,
    /// Intersections closer than this are merged in the optimization pass (m).
    pub intersection_merge_dist: f64,
    pub min_block_area: f64,
    pub max_block_area: f64,
    pub min_parcel_area: f64,
    /// Spatial index bucket size (m).
    pub cell_size: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            parallel_eps: 1e-3,
            edge_overlap: 2.0,
            line_t_eps: 1e-4,
            snap_threshold: 15.0,
            intersection_eps: 2.0,
            min_angle: 30f64.to_radians(),
            min_road_separation: 20.0,
            intersection_merge_dist: 10.0,
            min_block_area: 100.0,
            max_block_area: 50_000.0,
            min_parcel_area: 50.0,
            cell_size: 50.0,
        }
    }
}

/// Top-level core configuration: planning area, seed, era and tolerances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Planning-area extent in meters; origin is the area corner.
    pub width: f64,
    pub height: f64,
    pub seed: u32,
    pub era: Era,
    /// Run the procedural layout on boot (painting-only hosts disable this).
    pub generate_on_boot: bool,
    pub tolerances: Tolerances,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            width: 2000.0,
            height: 2000.0,
            seed: 12345,
            era: Era::Y1950s,
            generate_on_boot: true,
            tolerances: Tolerances::default(),
        }
    }
}

impl CoreConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str::<Self>(&content).unwrap_or_else(|err| {
                log::warn!("error parsing {:?}: {err}, using defaults", path);
                Self::default()
            }),
            Err(_) => {
                let default = Self::default();
                if let Ok(toml_str) = toml::to_string_pretty(&default) {
                    let _ = fs::write(path, toml_str);
                }
                default
            }
        }
    }

    #[inline]
    pub fn bounds(&self) -> DVec2 {
        DVec2::new(self.width, self.height)
    }

    #[inline]
    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= 0.0 && p.y >= 0.0 && p.x <= self.width && p.y <= self.height
    }

    /// Clamp a generated point into the planning area.
    #[inline]
    pub fn clamp(&self, p: DVec2) -> DVec2 {
        DVec2::new(p.x.clamp(0.0, self.width), p.y.clamp(0.0, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tolerances_match_calibration() {
        let t = Tolerances::default();
        assert_eq!(t.snap_threshold, 15.0);
        assert_eq!(t.intersection_eps, 2.0);
        assert!((t.min_angle - std::f64::consts::PI / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_clamp_and_contains() {
        let cfg = CoreConfig::default();
        assert!(cfg.contains(DVec2::new(100.0, 100.0)));
        assert!(!cfg.contains(DVec2::new(-1.0, 100.0)));
        let clamped = cfg.clamp(DVec2::new(-50.0, 9000.0));
        assert_eq!(clamped, DVec2::new(0.0, 2000.0));
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let cfg = CoreConfig::default();
        let s = toml::to_string_pretty(&cfg).unwrap();
        let back: CoreConfig = toml::from_str(&s).unwrap();
        assert_eq!(back.width, cfg.width);
        assert_eq!(back.seed, cfg.seed);
    }
}
