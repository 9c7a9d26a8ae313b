//! Per-parcel massing generation.
//!
//! Each parcel gets its own RNG stream seeded from the parcel id (plus a
//! level offset for upgrades), so a massing regenerates bit-identically at
//! any time. The volume is a tripartite stack (base, body, roof) on the
//! set-back footprint; the mesh is assembled per component with the fixed
//! material table.

use rand::seq::SliceRandom;

use crate::geom::{ensure_ccw, offset_polygon_inward, polygon_area};
use crate::layout::Era;
use crate::massing::massing_structs::*;
use crate::massing::mesh::{
    roof_barrel, roof_flat, roof_mansard, roof_ridge, roof_sawtooth, MeshBuilder, MeshData,
};
use crate::parcels::{Density, Parcel, ZoneType};
use crate::rng::Mulberry32;

/// Storey height in meters.
const FLOOR_HEIGHT: f64 = 3.0;
/// Footprints thinner than this emit no massing.
const MIN_FOOTPRINT_AREA: f64 = 4.0;

/// Draw a massing for `parcel`, or None when the setback collapses the
/// footprint (the parcel simply stays unbuilt).
pub fn generate_massing(
    parcel: &Parcel,
    era: Era,
    level: u32,
    massing_id: u32,
) -> Option<BuildingMassing> {
    let seed = parcel.id.wrapping_add(level.saturating_sub(1).wrapping_mul(1000));
    let mut rng = Mulberry32::new(seed);

    // 1-2. Setback and footprint.
    let (sb_lo, sb_hi) = parcel.density.setback_range();
    let setback = rng.range_f64(sb_lo, sb_hi);
    let mut footprint = offset_polygon_inward(&parcel.polygon, setback);
    if footprint.len() < 3 {
        log::debug!("parcel {}: setback collapsed footprint", parcel.id);
        return None;
    }
    ensure_ccw(&mut footprint);
    if polygon_area(&footprint) < MIN_FOOTPRINT_AREA {
        log::debug!("parcel {}: footprint area below minimum", parcel.id);
        return None;
    }

    // 3. Height by density, level and zone.
    let (h_lo, h_hi) = parcel.density.height_range();
    let mut height = rng.range_f64(h_lo, h_hi) * (1.0 + 0.3 * (level.max(1) - 1) as f64);
    height *= match parcel.zone {
        ZoneType::Commercial => 1.1,
        ZoneType::Industrial => 0.7,
        _ => 1.0,
    };

    // 4. Style and roof from the era pools, with use biases.
    let style = era
        .styles()
        .choose(&mut rng)
        .copied()
        .unwrap_or(Style::Modern);
    let mut roof = era
        .roofs()
        .choose(&mut rng)
        .copied()
        .unwrap_or(RoofType::Flat);
    if parcel.zone == ZoneType::Industrial && rng.chance(0.7) {
        roof = RoofType::Sawtooth;
    } else if parcel.zone == ZoneType::Commercial
        && parcel.density == Density::High
        && rng.chance(0.7)
    {
        roof = RoofType::Flat;
    }

    // 5. Tripartite split with jittered, clamped ratios.
    let (base_r, roof_r) = style.split_ratios();
    let base_r = (base_r + rng.range_f64(-0.05, 0.05)).clamp(0.05, 0.25);
    let roof_r = (roof_r + rng.range_f64(-0.05, 0.05)).clamp(0.03, 0.25);
    let base_h = height * base_r;
    let roof_h = height * roof_r;
    let body_h = height - base_h - roof_h;

    // 6. Floors from the body band.
    let floors = ((body_h / FLOOR_HEIGHT).round() as u32).max(1);

    Some(BuildingMassing {
        id: massing_id,
        parcel: parcel.id,
        footprint,
        total_height: height,
        base_h,
        body_h,
        roof_h,
        floors,
        style,
        roof,
        seed,
        zone: parcel.zone,
        density: parcel.density,
        level: level.max(1),
    })
}

/// Assemble the component mesh for a massing at the requested LOD.
pub fn mesh_for_massing(m: &BuildingMassing, lod: Lod) -> MeshData {
    let mut b = MeshBuilder::new();
    let ring = &m.footprint;
    let body_mat = material_for(m.zone, m.style, ComponentKind::Body, m.roof);

    if lod == Lod::Box {
        // Extruded footprint plus a top cap, nothing else.
        b.wall_band(ring, 0.0, m.total_height, body_mat);
        b.cap(ring, m.total_height, body_mat, true);
        return b.finish();
    }

    let base_mat = material_for(m.zone, m.style, ComponentKind::Base, m.roof);
    let roof_mat = material_for(m.zone, m.style, ComponentKind::Roof, m.roof);
    let detail_mat = material_for(m.zone, m.style, ComponentKind::Detail, m.roof);

    // Base band.
    b.wall_band(ring, 0.0, m.base_h, base_mat);

    // Body band, one ring of quads per floor. The commercial ground floor
    // is half again as tall as the rest; remaining floors share the rest
    // of the band evenly.
    let body_top = m.base_h + m.body_h;
    let floors = m.floors.max(1) as usize;
    let mut cuts: Vec<f64> = Vec::with_capacity(floors + 1);
    if m.zone == ZoneType::Commercial && floors > 1 {
        let unit = m.body_h / (floors as f64 + 0.5);
        cuts.push(m.base_h);
        cuts.push(m.base_h + unit * 1.5);
        for f in 2..=floors {
            cuts.push(m.base_h + unit * 1.5 + unit * (f - 1) as f64);
        }
    } else {
        let unit = m.body_h / floors as f64;
        for f in 0..=floors {
            cuts.push(m.base_h + unit * f as f64);
        }
    }
    for pair in cuts.windows(2) {
        b.wall_band(ring, pair[0], pair[1], body_mat);
    }

    // Style-conditional details, full LOD only.
    if lod == Lod::Full {
        emit_details(&mut b, m, &cuts, detail_mat);
    }

    // Roof band.
    let roof_top = body_top + m.roof_h;
    match m.roof {
        RoofType::Flat => roof_flat(&mut b, ring, body_top, roof_top, roof_mat),
        RoofType::Green => roof_flat(&mut b, ring, body_top, roof_top, roof_mat),
        RoofType::Gable => roof_ridge(&mut b, ring, body_top, roof_top, 0.9, roof_mat),
        RoofType::Hip => roof_ridge(&mut b, ring, body_top, roof_top, 0.5, roof_mat),
        RoofType::Pyramid => roof_ridge(&mut b, ring, body_top, roof_top, 0.0, roof_mat),
        RoofType::Mansard => roof_mansard(&mut b, ring, body_top, roof_top, roof_mat),
        RoofType::Barrel => roof_barrel(&mut b, ring, body_top, roof_top, roof_mat),
        RoofType::Sawtooth => roof_sawtooth(&mut b, ring, body_top, roof_top, roof_mat),
    }

    b.finish()
}

/// Balconies, clerestories and loading docks, dispatched by zone.
fn emit_details(b: &mut MeshBuilder, m: &BuildingMassing, cuts: &[f64], detail_mat: Material) {
    let ring = &m.footprint;
    let n = ring.len();
    if n < 3 {
        return;
    }
    // Longest footprint edge hosts the details.
    let host = (0..n)
        .max_by(|&i, &j| {
            let li = ring[i].distance(ring[(i + 1) % n]);
            let lj = ring[j].distance(ring[(j + 1) % n]);
            li.partial_cmp(&lj).unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(0);
    let ea = ring[host];
    let eb = ring[(host + 1) % n];
    let edge_len = ea.distance(eb);
    if edge_len < 2.0 {
        return;
    }
    let along = (eb - ea) / edge_len;
    // Details protrude outward: right of a CCW edge.
    let outward = glam::DVec2::new(along.y, -along.x);
    let mid = (ea + eb) * 0.5;

    match m.zone {
        ZoneType::Residential if m.density != Density::Low => {
            // Balconies on even floors.
            for (floor, pair) in cuts.windows(2).enumerate() {
                if floor % 2 == 1 {
                    let h0 = pair[0];
                    b.detail_box(
                        mid + outward * 0.6,
                        along,
                        (edge_len * 0.2).min(3.0),
                        0.6,
                        h0,
                        h0 + 1.0,
                        detail_mat,
                    );
                }
            }
        }
        ZoneType::Industrial => {
            // Loading dock at grade.
            b.detail_box(
                mid + outward * 1.2,
                along,
                (edge_len * 0.25).min(4.0),
                1.2,
                0.0,
                1.2,
                Material::Concrete,
            );
            // Clerestory band under the roof line.
            if let Some(pair) = cuts.windows(2).last() {
                b.wall_band(
                    &offset_polygon_inward(ring, -0.05),
                    pair[0],
                    pair[1],
                    Material::Glass,
                );
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockId;
    use glam::DVec2;

    fn parcel(zone: ZoneType, density: Density) -> Parcel {
        let polygon = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(20.0, 0.0),
            DVec2::new(20.0, 30.0),
            DVec2::new(0.0, 30.0),
        ];
        Parcel {
            id: 7,
            area: polygon_area(&polygon),
            centroid: crate::geom::centroid(&polygon),
            polygon,
            zone,
            density,
            frontage: 20.0,
            frontage_edge: None,
            is_corner: false,
            block: BlockId::new(0),
        }
    }

    #[test]
    fn test_heights_sum_to_total() {
        let p = parcel(ZoneType::Residential, Density::Medium);
        let m = generate_massing(&p, Era::Y1950s, 1, 0).unwrap();
        assert!((m.base_h + m.body_h + m.roof_h - m.total_height).abs() < 1e-9);
        assert!(m.base_h > 0.0 && m.body_h > 0.0 && m.roof_h > 0.0);
        assert_eq!(m.floors, (m.body_h / 3.0).round().max(1.0) as u32);
    }

    #[test]
    fn test_massing_is_reproducible() {
        let p = parcel(ZoneType::Commercial, Density::High);
        let a = generate_massing(&p, Era::Y1990s, 1, 0).unwrap();
        let b = generate_massing(&p, Era::Y1990s, 1, 0).unwrap();
        assert_eq!(a.total_height, b.total_height);
        assert_eq!(a.style, b.style);
        assert_eq!(a.roof, b.roof);
        assert_eq!(a.footprint, b.footprint);
    }

    #[test]
    fn test_level_scales_height() {
        let p = parcel(ZoneType::Residential, Density::Medium);
        let l1 = generate_massing(&p, Era::Y1950s, 1, 0).unwrap();
        let l3 = generate_massing(&p, Era::Y1950s, 3, 0).unwrap();
        // Level 3 scales the 9-15 m band by 1.6.
        assert!(l1.total_height <= 15.0 + 1e-9);
        assert!(l3.total_height >= 9.0 * 1.6 - 1e-9);
        assert!(l3.total_height <= 15.0 * 1.6 + 1e-9);
        assert_eq!(l3.level, 3);
    }

    #[test]
    fn test_zone_height_adjustments() {
        // Same density band; commercial gains 10%, industrial loses 30%.
        // Compare against the band edges instead of a paired draw.
        let com = generate_massing(&parcel(ZoneType::Commercial, Density::Medium), Era::Y1990s, 1, 0)
            .unwrap();
        assert!(com.total_height <= 15.0 * 1.1 + 1e-9);
        assert!(com.total_height >= 9.0 * 1.1 - 1e-9);
        let ind = generate_massing(&parcel(ZoneType::Industrial, Density::Medium), Era::Y1990s, 1, 0)
            .unwrap();
        assert!(ind.total_height <= 15.0 * 0.7 + 1e-9);
    }

    #[test]
    fn test_tiny_parcel_emits_nothing() {
        let polygon = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(6.0, 0.0),
            DVec2::new(6.0, 6.0),
            DVec2::new(0.0, 6.0),
        ];
        let p = Parcel {
            id: 9,
            area: polygon_area(&polygon),
            centroid: crate::geom::centroid(&polygon),
            polygon,
            zone: ZoneType::Residential,
            density: Density::Low,
            frontage: 6.0,
            frontage_edge: None,
            is_corner: false,
            block: BlockId::new(0),
        };
        // A 6 m square with a 4-6 m setback always collapses.
        assert!(generate_massing(&p, Era::Y1950s, 1, 0).is_none());
    }

    #[test]
    fn test_style_comes_from_era_pool() {
        for era in Era::ALL {
            let p = parcel(ZoneType::Residential, Density::Medium);
            let m = generate_massing(&p, era, 1, 0).unwrap();
            assert!(era.styles().contains(&m.style), "{era:?} produced {:?}", m.style);
        }
    }

    #[test]
    fn test_box_lod_is_minimal() {
        let p = parcel(ZoneType::Residential, Density::Medium);
        let m = generate_massing(&p, Era::Y1950s, 1, 0).unwrap();
        let mesh = mesh_for_massing(&m, Lod::Box);
        // 4 wall quads + 2 cap triangles.
        assert_eq!(mesh.triangle_count(), 10);
        let full = mesh_for_massing(&m, Lod::Full);
        assert!(full.triangle_count() > mesh.triangle_count());
    }

    #[test]
    fn test_mesh_heights_match_massing() {
        let p = parcel(ZoneType::Residential, Density::Medium);
        let m = generate_massing(&p, Era::Y1950s, 1, 0).unwrap();
        let mesh = mesh_for_massing(&m, Lod::Mid);
        let max_y = (0..mesh.vertex_count())
            .map(|v| mesh.positions[v * 3 + 1])
            .fold(f32::MIN, f32::max);
        // Ridge or cap tops out at the massing height.
        assert!(max_y <= m.total_height as f32 + 1e-3);
        assert!(max_y >= (m.base_h + m.body_h) as f32 - 1e-3);
    }

    #[test]
    fn test_mid_lod_has_floor_bands() {
        let p = parcel(ZoneType::Residential, Density::High);
        let m = generate_massing(&p, Era::Y1990s, 1, 0).unwrap();
        let mesh = mesh_for_massing(&m, Lod::Mid);
        // At least one wall ring per floor plus base and roof geometry.
        assert!(mesh.triangle_count() >= (m.floors as usize + 2) * 8);
    }

    #[test]
    fn test_industrial_biased_to_sawtooth() {
        let mut saw = 0;
        let mut total = 0;
        for id in 0..40 {
            let mut p = parcel(ZoneType::Industrial, Density::Medium);
            p.id = id;
            if let Some(m) = generate_massing(&p, Era::Y1950s, 1, 0) {
                total += 1;
                if m.roof == RoofType::Sawtooth {
                    saw += 1;
                }
            }
        }
        assert!(total > 0);
        assert!(saw * 3 > total, "sawtooth share {saw}/{total} below bias");
    }
}
