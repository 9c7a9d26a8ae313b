//! Block subdivision into parcels.
//!
//! Two strategies tile a block with zone-sized parcels:
//!
//! - **Skeleton**: rectangular strips along the frontage edge, one or two
//!   rows deep, each clipped to the block.
//! - **Voronoi**: seeds scattered over the block, each cell carved by
//!   clipping the block against the perpendicular-bisector half-plane
//!   toward the seed, against every other seed. O(N^2) in seeds, which is
//!   fine at block scale.
//!
//! Degenerate clip results (under 3 vertices or the minimum parcel area)
//! are silently dropped; the caller reads emitted/dropped counts off the
//! returned set.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::blocks::CityBlock;
use crate::config::Tolerances;
use crate::geom::{
    centroid, clip_by_half_plane, dist_point_to_segment, ensure_ccw, oriented_bounding_box,
    point_in_polygon, polygon_area,
};
use crate::parcels::parcel_structs::{Density, Parcel, ZoneType};
use crate::rng::Mulberry32;
use crate::roads::EdgeId;

/// Road segment geometry the subdivider matches frontage against.
pub type RoadSeg = (EdgeId, DVec2, DVec2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubdivisionMethod {
    Skeleton,
    Voronoi,
}

impl Default for SubdivisionMethod {
    fn default() -> Self {
        SubdivisionMethod::Skeleton
    }
}

/// Result of one block subdivision: surviving parcels plus the count of
/// candidate cells dropped as degenerate or undersized.
#[derive(Debug, Default)]
pub struct SubdivisionOutcome {
    pub parcels: Vec<Parcel>,
    pub dropped: usize,
}

/// Tile `block` with parcels. Ids are assigned sequentially from
/// `id_start` in emission order, which keeps repeated paints bit-identical.
pub fn subdivide_block(
    block: &CityBlock,
    roads: &[RoadSeg],
    zone: ZoneType,
    density: Density,
    method: SubdivisionMethod,
    rng: &mut Mulberry32,
    tol: &Tolerances,
    id_start: u32,
) -> SubdivisionOutcome {
    let polygons = match method {
        SubdivisionMethod::Skeleton => skeleton_strips(block, roads, zone, density),
        SubdivisionMethod::Voronoi => voronoi_cells(block, zone, density, rng),
    };

    let mut outcome = SubdivisionOutcome::default();
    let parcels = &mut outcome.parcels;
    for mut polygon in polygons {
        ensure_ccw(&mut polygon);
        let area = polygon_area(&polygon);
        if polygon.len() < 3 || area < tol.min_parcel_area {
            log::debug!("dropping degenerate parcel ({} verts, {:.1} m2)", polygon.len(), area);
            outcome.dropped += 1;
            continue;
        }
        let (frontage, frontage_edge, is_corner) = measure_frontage(&polygon, roads, tol);
        parcels.push(Parcel {
            id: id_start + parcels.len() as u32,
            centroid: centroid(&polygon),
            area,
            frontage,
            frontage_edge,
            is_corner,
            polygon,
            zone,
            density,
            block: block.id,
        });
    }
    outcome
}

/// Mean zone width scaled by density.
fn target_width(zone: ZoneType, density: Density) -> f64 {
    let (lo, hi) = zone.width_range();
    (lo + hi) * 0.5 * density.width_multiplier()
}

// ----------------------------------------------------------------------------
// Skeleton strips
// ----------------------------------------------------------------------------

/// Block edge serving as the frontage: midpoint closest to any bounding
/// road; lower index wins ties. Without roads (virtual blocks) the longest
/// edge stands in.
fn frontage_edge_index(block: &CityBlock, roads: &[RoadSeg]) -> usize {
    let n = block.polygon.len();
    if roads.is_empty() {
        return (0..n)
            .max_by(|&i, &j| {
                let li = block.polygon[i].distance(block.polygon[(i + 1) % n]);
                let lj = block.polygon[j].distance(block.polygon[(j + 1) % n]);
                li.partial_cmp(&lj).unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(0);
    }
    let mut best = (f64::MAX, 0usize);
    for i in 0..n {
        let mid = (block.polygon[i] + block.polygon[(i + 1) % n]) * 0.5;
        let d = roads
            .iter()
            .map(|&(_, a, b)| dist_point_to_segment(mid, a, b))
            .fold(f64::MAX, f64::min);
        if d < best.0 {
            best = (d, i);
        }
    }
    best.1
}

fn skeleton_strips(
    block: &CityBlock,
    roads: &[RoadSeg],
    zone: ZoneType,
    density: Density,
) -> Vec<Vec<DVec2>> {
    let ring = &block.polygon;
    let n = ring.len();
    if n < 3 {
        return Vec::new();
    }

    let fi = frontage_edge_index(block, roads);
    let fa = ring[fi];
    let fb = ring[(fi + 1) % n];
    let frontage_len = fa.distance(fb);
    if frontage_len < 1e-6 {
        return Vec::new();
    }
    let along = (fb - fa) / frontage_len;
    // Interior side of a CCW ring is to the left of the edge.
    let inward = DVec2::new(-along.y, along.x);

    let width_goal = target_width(zone, density);
    let depth = width_goal * density.depth_multiplier();
    let count = (frontage_len / width_goal).round().max(1.0) as usize;
    let width = frontage_len / count as f64;

    // Depth of the block measured off the frontage line.
    let block_depth = ring
        .iter()
        .map(|&v| (v - fa).dot(inward))
        .fold(0.0f64, f64::max);
    let two_rows = block_depth > 2.5 * depth && density != Density::Low;

    let rows: &[(f64, f64)] = if two_rows {
        &[(0.0, 1.0), (1.0, 2.0)]
    } else {
        &[(0.0, 1.0)]
    };

    let mut out = Vec::new();
    for &(near, far) in rows {
        for i in 0..count {
            let s0 = fa + along * (width * i as f64) + inward * (depth * near);
            let s1 = fa + along * (width * (i + 1) as f64) + inward * (depth * near);
            let rect = [
                s0,
                s1,
                s1 + inward * (depth * (far - near)),
                s0 + inward * (depth * (far - near)),
            ];
            out.push(clip_rect_to_block(&rect, ring));
        }
    }
    out
}

/// Intersection of an axis-agnostic rectangle with the block ring,
/// computed by clipping the ring against the rectangle's four inward
/// half-planes (the rectangle is convex; the ring need not be).
fn clip_rect_to_block(rect: &[DVec2; 4], ring: &[DVec2]) -> Vec<DVec2> {
    let mut poly = ring.to_vec();
    for i in 0..4 {
        if poly.len() < 3 {
            return Vec::new();
        }
        let a = rect[i];
        let b = rect[(i + 1) % 4];
        let dir = (b - a).normalize_or_zero();
        // Rectangle wound CCW: interior is left of each edge.
        let inward = DVec2::new(-dir.y, dir.x);
        poly = clip_by_half_plane(&poly, a, inward);
    }
    poly
}

// ----------------------------------------------------------------------------
// Voronoi cells
// ----------------------------------------------------------------------------

fn voronoi_cells(
    block: &CityBlock,
    zone: ZoneType,
    density: Density,
    rng: &mut Mulberry32,
) -> Vec<Vec<DVec2>> {
    let ring = &block.polygon;
    if ring.len() < 3 {
        return Vec::new();
    }

    let (min_w, _) = zone.width_range();
    let mean_w = target_width(zone, density) / density.width_multiplier();
    let target_area = mean_w * mean_w * density.depth_multiplier() * density.width_multiplier();
    let hard_cap = (block.area / (min_w * min_w * 0.8)).ceil() as usize;
    let count = ((block.area / target_area) as usize).clamp(2, hard_cap.max(2));

    let seeds = place_seeds(block, count, target_area, rng);
    if seeds.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    for (i, &seed) in seeds.iter().enumerate() {
        let mut cell = ring.to_vec();
        for (j, &other) in seeds.iter().enumerate() {
            if i == j || cell.len() < 3 {
                continue;
            }
            let mid = (seed + other) * 0.5;
            let toward = (seed - other).normalize_or_zero();
            cell = clip_by_half_plane(&cell, mid, toward);
        }
        out.push(cell);
    }
    out
}

/// Rotated-jittered grid over the block's OBB, topped up by rejection
/// sampling with a minimum seed spacing.
fn place_seeds(block: &CityBlock, count: usize, target_area: f64, rng: &mut Mulberry32) -> Vec<DVec2> {
    let ring = &block.polygon;
    let obb = oriented_bounding_box(ring);
    let perp = DVec2::new(-obb.axis.y, obb.axis.x);

    let side = (count as f64).sqrt().ceil() as usize;
    let step_a = 2.0 * obb.half_extents.x / side as f64;
    let step_p = 2.0 * obb.half_extents.y / side as f64;

    let mut seeds: Vec<DVec2> = Vec::with_capacity(count);
    for gy in 0..side {
        for gx in 0..side {
            if seeds.len() >= count {
                break;
            }
            let ja = rng.range_f64(-0.3, 0.3) * step_a;
            let jp = rng.range_f64(-0.3, 0.3) * step_p;
            let a = -obb.half_extents.x + step_a * (gx as f64 + 0.5) + ja;
            let p = -obb.half_extents.y + step_p * (gy as f64 + 0.5) + jp;
            let candidate = obb.center + obb.axis * a + perp * p;
            if point_in_polygon(candidate, ring) {
                seeds.push(candidate);
            }
        }
    }

    // Top up to the requested count with spacing-constrained rejection.
    let spacing = 0.4 * target_area.sqrt();
    let (bb_min, bb_max) = crate::geom::polygon_bounds(ring);
    let mut attempts = 0;
    let max_attempts = 20 * count;
    while seeds.len() < count && attempts < max_attempts {
        attempts += 1;
        let candidate = DVec2::new(
            rng.range_f64(bb_min.x, bb_max.x),
            rng.range_f64(bb_min.y, bb_max.y),
        );
        if !point_in_polygon(candidate, ring) {
            continue;
        }
        if seeds.iter().all(|&s| s.distance(candidate) >= spacing) {
            seeds.push(candidate);
        }
    }
    seeds
}

// ----------------------------------------------------------------------------
// Frontage
// ----------------------------------------------------------------------------

/// Sum the lengths of parcel edges lying on a road-adjacent block edge
/// (within the overlap tolerance, near-parallel). Falls back to the longest
/// parcel edge when nothing matches, which is also the standalone-zone
/// behavior; that estimate is kept even though no road backs it.
fn measure_frontage(
    polygon: &[DVec2],
    roads: &[RoadSeg],
    tol: &Tolerances,
) -> (f64, Option<EdgeId>, bool) {
    let n = polygon.len();
    let mut frontage = 0.0;
    let mut first_edge: Option<EdgeId> = None;
    let mut matched: Vec<EdgeId> = Vec::new();

    for i in 0..n {
        let pa = polygon[i];
        let pb = polygon[(i + 1) % n];
        let len = pa.distance(pb);
        if len < 1e-9 {
            continue;
        }
        let dir = (pb - pa) / len;
        let mid = (pa + pb) * 0.5;

        for &(eid, ra, rb) in roads {
            let rlen = ra.distance(rb);
            if rlen < 1e-9 {
                continue;
            }
            let rdir = (rb - ra) / rlen;
            let aligned = dir.dot(rdir).abs() > 0.95;
            let close = dist_point_to_segment(mid, ra, rb) <= tol.edge_overlap
                && dist_point_to_segment(pa, ra, rb) <= tol.edge_overlap
                && dist_point_to_segment(pb, ra, rb) <= tol.edge_overlap;
            if aligned && close {
                frontage += len;
                if first_edge.is_none() {
                    first_edge = Some(eid);
                }
                if !matched.contains(&eid) {
                    matched.push(eid);
                }
                break;
            }
        }
    }

    if frontage == 0.0 {
        // Longest-edge estimate.
        frontage = (0..n)
            .map(|i| polygon[i].distance(polygon[(i + 1) % n]))
            .fold(0.0, f64::max);
    }
    (frontage, first_edge, matched.len() >= 2)
}
