//! City blocks: bounded faces of the road graph.
//!
//! Faces are traced over directed half-edges: adjacency at every node is
//! sorted by bearing, and each face follows the clockwise successor of the
//! reverse half-edge, so interior faces come out counterclockwise and the
//! unbounded outer face (negative signed area) is discarded. Only faces of
//! 3 to 12 nodes inside the block area band are kept, capped at 500 per
//! pass. The graph is a bounded-error embedding, so a face can still be
//! missed near weld tolerances; downstream zoning tolerates missing blocks
//! by falling back to standalone parcels.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::geom::{centroid, ensure_ccw, polygon_area, polygon_perimeter};
use crate::roads::{EdgeId, NodeId, RoadGraph};

/// Stable identifier of a block within one find pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct BlockId(pub u32);

impl BlockId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct CityBlock {
    pub id: BlockId,
    /// Outer ring, CCW.
    pub polygon: Vec<DVec2>,
    /// Interior holes. Always empty from the cycle extractor; kept in the
    /// model for virtual blocks and future face traversal.
    pub holes: Vec<Vec<DVec2>>,
    /// Road edges bounding the block, in ring order where known.
    pub road_edges: Vec<EdgeId>,
    pub area: f64,
    pub perimeter: f64,
    /// Parcels currently tiling this block.
    pub parcel_ids: Vec<u32>,
    /// True for paint-polygon fallback blocks with no bounding roads.
    pub virtual_block: bool,
}

impl CityBlock {
    pub fn centroid(&self) -> DVec2 {
        centroid(&self.polygon)
    }
}

/// Enumerate blocks from the current road graph.
pub fn find_blocks(graph: &RoadGraph) -> Vec<CityBlock> {
    let tol = graph.tolerances();
    let min_cycle = 3;
    let max_cycle = 12;
    let max_cycles = 500;
    // Faces longer than the cycle cap are still traced to completion so
    // their half-edges are consumed; the guard bounds pathological walks.
    let trace_guard = 256;

    // Half-edge ids: 2 * edge index for a->b, +1 for b->a.
    let live: Vec<EdgeId> = graph.iter_enabled_edges().map(|(id, _)| id).collect();
    let he_count = graph.edges.len() * 2;

    let he_tail = |he: usize| -> NodeId {
        let e = graph.edge(EdgeId::new((he / 2) as u32));
        if he % 2 == 0 {
            e.a
        } else {
            e.b
        }
    };
    let he_head = |he: usize| -> NodeId {
        let e = graph.edge(EdgeId::new((he / 2) as u32));
        if he % 2 == 0 {
            e.b
        } else {
            e.a
        }
    };

    // Outgoing half-edges per node, sorted by bearing.
    let mut outgoing: Vec<Vec<(f64, usize)>> = vec![Vec::new(); graph.nodes.len()];
    for &eid in &live {
        let e = graph.edge(eid);
        let pa = graph.node(e.a).position;
        let pb = graph.node(e.b).position;
        let fwd = 2 * eid.raw() as usize;
        outgoing[e.a.raw() as usize].push(((pb - pa).y.atan2((pb - pa).x), fwd));
        outgoing[e.b.raw() as usize].push(((pa - pb).y.atan2((pa - pb).x), fwd + 1));
    }
    for list in &mut outgoing {
        list.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    }

    // Clockwise successor of the reverse half-edge: the entry with the
    // largest bearing strictly below it, wrapping around.
    let next_he = |he: usize| -> Option<usize> {
        let v = he_head(he);
        let list = &outgoing[v.raw() as usize];
        if list.is_empty() {
            return None;
        }
        let u = he_tail(he);
        let pv = graph.node(v).position;
        let pu = graph.node(u).position;
        let rev_angle = (pu - pv).y.atan2((pu - pv).x);
        let mut idx = list.partition_point(|&(a, _)| a < rev_angle - 1e-12);
        if idx == 0 {
            idx = list.len();
        }
        Some(list[idx - 1].1)
    };

    let mut used = vec![false; he_count];
    let mut cycles: Vec<Vec<NodeId>> = Vec::new();

    'outer: for &eid in &live {
        for start in [2 * eid.raw() as usize, 2 * eid.raw() as usize + 1] {
            if used[start] {
                continue;
            }
            let mut face: Vec<NodeId> = Vec::new();
            let mut he = start;
            let mut closed = false;
            for _ in 0..trace_guard {
                used[he] = true;
                face.push(he_tail(he));
                match next_he(he) {
                    Some(next) => {
                        if next == start {
                            closed = true;
                            break;
                        }
                        he = next;
                    }
                    None => break,
                }
            }
            if !closed || face.len() < min_cycle || face.len() > max_cycle {
                continue;
            }
            let ring: Vec<DVec2> = face.iter().map(|&n| graph.node(n).position).collect();
            if crate::geom::signed_area(&ring) <= 0.0 {
                // The unbounded outer face.
                continue;
            }
            cycles.push(face);
            if cycles.len() >= max_cycles {
                break 'outer;
            }
        }
    }

    let mut blocks = Vec::new();
    for cycle in cycles {
        let mut polygon: Vec<DVec2> = cycle.iter().map(|&n| graph.node(n).position).collect();
        let area = polygon_area(&polygon);
        if area <= tol.min_block_area || area >= tol.max_block_area {
            continue;
        }

        // Edge ids between consecutive ring nodes.
        let mut road_edges = Vec::with_capacity(cycle.len());
        for i in 0..cycle.len() {
            let a = cycle[i];
            let b = cycle[(i + 1) % cycle.len()];
            if let Some(eid) = graph.find_edge(a, b) {
                road_edges.push(eid);
            }
        }

        ensure_ccw(&mut polygon);
        let id = BlockId::new(blocks.len() as u32);
        blocks.push(CityBlock {
            id,
            perimeter: polygon_perimeter(&polygon),
            area,
            polygon,
            holes: Vec::new(),
            road_edges,
            parcel_ids: Vec::new(),
            virtual_block: false,
        });
    }

    log::debug!("block finder: {} blocks", blocks.len());
    blocks
}
