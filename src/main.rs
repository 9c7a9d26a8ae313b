use glam::DVec2;

use cityfabric::core::{Reply, Request, ZoneRequest};
use cityfabric::parcels::{Density, ZoneType};
use cityfabric::roads::RoadClass;
use cityfabric::{CityCore, CoreConfig};

/// Demo driver: boot a city, paint a road and a zone, spawn buildings,
/// and log what came back.
fn main() {
    env_logger::init();

    let cfg = CoreConfig::load("cityfabric.toml");
    let seed = cfg.seed;
    let era = cfg.era;
    let mut core = CityCore::new(cfg);

    if let Reply::RoadsGenerated {
        segments,
        intersections,
    } = core.handle(Request::Boot { seed, era })
    {
        log::info!(
            "booted: {} road segments, {} intersections",
            segments.len() / 6,
            intersections.len()
        );
    }

    core.handle(Request::PaintRoad {
        start: DVec2::new(200.0, 1000.0),
        end: DVec2::new(1800.0, 1000.0),
        class: RoadClass::Avenue,
    });

    if let Reply::ZonePainted {
        affected_parcels, ..
    } = core.handle(Request::PaintZone(ZoneRequest {
        polygon: vec![
            DVec2::new(600.0, 600.0),
            DVec2::new(1400.0, 600.0),
            DVec2::new(1400.0, 1400.0),
            DVec2::new(600.0, 1400.0),
        ],
        zone: ZoneType::Residential,
        density: Density::Medium,
        method: None,
    })) {
        log::info!("zoned {} parcels", affected_parcels.len());
    }

    if let Reply::BuildingsGenerated {
        emitted, dropped, ..
    } = core.handle(Request::GenerateBuildings { lod: None })
    {
        log::info!("massings: {emitted} emitted, {dropped} dropped");
    }
}
