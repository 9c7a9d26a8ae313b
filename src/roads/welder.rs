//! Online intersection welding.
//!
//! Keeps the road graph a bounded-error planar embedding while arbitrary
//! user-drawn or generated segments arrive: a new segment is split at every
//! mid-span crossing with an existing edge, both sides are re-stitched
//! through a shared node, and an intersection table (position, incident
//! segments, type, radius) is maintained alongside.
//!
//! Determinism: existing edges are scanned in id order, crossings sorted by
//! parameter along the incoming segment, ties broken by distance to the
//! crossed edge's endpoint.

use glam::DVec2;

use crate::geom::{dist_point_to_segment, project_param, segment_intersect};
use crate::roads::road_graph::RoadGraph;
use crate::roads::road_structs::*;

/// Stable identifier into the welder's intersection table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct IntersectionId(pub u32);

impl IntersectionId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Junction shape by incident segment count: 2, 3, 4, >= 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntersectionKind {
    End,
    Tee,
    Cross,
    Complex,
}

impl IntersectionKind {
    pub fn from_degree(degree: usize) -> Option<Self> {
        match degree {
            0 | 1 => None,
            2 => Some(IntersectionKind::End),
            3 => Some(IntersectionKind::Tee),
            4 => Some(IntersectionKind::Cross),
            _ => Some(IntersectionKind::Complex),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntersectionRecord {
    pub position: DVec2,
    /// Incident edge ids, ascending.
    pub segments: Vec<EdgeId>,
    pub kind: IntersectionKind,
    /// Mean of incident-segment angles, radians.
    pub orientation: f64,
    /// Paved junction radius, 0.75 x widest incident road.
    pub radius: f64,
    pub enabled: bool,
}

/// Result of welding one painted segment into the graph.
#[derive(Debug, Default)]
pub struct WeldOutcome {
    /// Sub-segments of the incoming span, in order along it.
    pub new_edges: Vec<EdgeId>,
    /// Replacement halves of edges that were split by a crossing.
    pub rebuilt_edges: Vec<EdgeId>,
    /// Intersection records created or refreshed by this weld.
    pub intersections: Vec<IntersectionId>,
    /// Sub-segments refused by the graph (acute angle, collapsed span).
    pub rejections: Vec<EdgeRejection>,
}

impl WeldOutcome {
    /// A weld succeeds when at least one sub-segment landed.
    #[inline]
    pub fn success(&self) -> bool {
        !self.new_edges.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct Crossing {
    edge: EdgeId,
    point: DVec2,
    /// Parameter along the incoming span.
    t: f64,
    /// Distance from the crossing to the nearest endpoint of the crossed
    /// edge; deterministic tie-break for equal t.
    endpoint_dist: f64,
}

pub struct Welder {
    records: Vec<IntersectionRecord>,
}

impl Welder {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn record(&self, id: IntersectionId) -> &IntersectionRecord {
        &self.records[id.raw() as usize]
    }

    pub fn iter_enabled(&self) -> impl Iterator<Item = (IntersectionId, &IntersectionRecord)> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.enabled)
            .map(|(i, r)| (IntersectionId::new(i as u32), r))
    }

    pub fn enabled_count(&self) -> usize {
        self.records.iter().filter(|r| r.enabled).count()
    }

    /// Weld a straight span p-q into the graph: find mid-span crossings
    /// against existing edges, split both sides at shared nodes, insert the
    /// resulting sub-segments with endpoint snapping, and refresh the
    /// intersection table at every touched point.
    pub fn add_segment(
        &mut self,
        graph: &mut RoadGraph,
        p: DVec2,
        q: DVec2,
        class: RoadClass,
        material: RoadMaterial,
    ) -> WeldOutcome {
        let mut outcome = WeldOutcome::default();
        let tol = graph.tolerances().clone();

        if p.distance(q) < tol.intersection_eps {
            outcome.rejections.push(EdgeRejection::Degenerate);
            return outcome;
        }

        // 1-2. Collect crossings strictly interior to both spans.
        let mut crossings: Vec<Crossing> = Vec::new();
        for (eid, edge) in graph.iter_enabled_edges() {
            let ea = graph.node(edge.a).position;
            let eb = graph.node(edge.b).position;
            let Some(x) = segment_intersect(p, q, ea, eb, tol.parallel_eps, tol.line_t_eps) else {
                continue;
            };
            let interior_s =
                x.distance(p) > tol.intersection_eps && x.distance(q) > tol.intersection_eps;
            let interior_e =
                x.distance(ea) > tol.intersection_eps && x.distance(eb) > tol.intersection_eps;
            if interior_s && interior_e {
                crossings.push(Crossing {
                    edge: eid,
                    point: x,
                    t: project_param(x, p, q),
                    endpoint_dist: x.distance(ea).min(x.distance(eb)),
                });
            }
        }

        // 3. Strict deterministic order along the span.
        crossings.sort_by(|l, r| {
            l.t.partial_cmp(&r.t)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    l.endpoint_dist
                        .partial_cmp(&r.endpoint_dist)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(l.edge.cmp(&r.edge))
        });

        // Split every crossed edge through a node at its crossing point.
        let mut waypoints: Vec<NodeId> = Vec::with_capacity(crossings.len() + 2);
        let start = graph.add_node(p);
        waypoints.push(start);

        for crossing in &crossings {
            let node_x = self.node_at_crossing(graph, crossing.point);
            let edge = graph.edge(crossing.edge).clone();
            if !edge.enabled || edge.a == node_x || edge.b == node_x {
                // Already consumed by an earlier crossing in this weld, or
                // the crossing collapsed into an existing endpoint.
                waypoints.push(node_x);
                continue;
            }
            graph.remove_edge(crossing.edge);
            for (na, nb) in [(edge.a, node_x), (node_x, edge.b)] {
                match graph.add_edge(na, nb, edge.class, edge.material) {
                    Ok(id) => outcome.rebuilt_edges.push(id),
                    Err(rej) => {
                        log::warn!("edge split half rejected: {rej}");
                        outcome.rejections.push(rej);
                    }
                }
            }
            waypoints.push(node_x);
        }

        let end = graph.add_node(q);
        waypoints.push(end);
        waypoints.dedup();

        // 4. Insert the sub-segments of the incoming span.
        for pair in waypoints.windows(2) {
            match graph.add_edge(pair[0], pair[1], class, material) {
                Ok(id) => outcome.new_edges.push(id),
                Err(rej) => outcome.rejections.push(rej),
            }
        }

        // 5. Refresh intersection records at every touched point.
        let mut touched: Vec<NodeId> = waypoints;
        for eid in outcome.rebuilt_edges.iter().chain(outcome.new_edges.iter()) {
            let e = graph.edge(*eid);
            touched.push(e.a);
            touched.push(e.b);
        }
        touched.sort_unstable();
        touched.dedup();
        for node in touched {
            if let Some(rid) = self.refresh_at(graph, node) {
                if !outcome.intersections.contains(&rid) {
                    outcome.intersections.push(rid);
                }
            }
        }

        outcome
    }

    /// Node for a crossing point: reuse anything within the weld epsilon,
    /// otherwise create an exact node (bypassing the wide paint snap, which
    /// would drag the crossing off the crossed edge).
    fn node_at_crossing(&self, graph: &mut RoadGraph, x: DVec2) -> NodeId {
        let eps = graph.tolerances().intersection_eps;
        if let Some(near) = graph.nearest_node(x, eps) {
            return near;
        }
        graph.add_node_exact(x)
    }

    /// Recompute the record at `node`'s position. Returns the record id if
    /// the point still qualifies as an intersection (>= 2 incident edges
    /// within the weld epsilon).
    pub fn refresh_at(&mut self, graph: &RoadGraph, node: NodeId) -> Option<IntersectionId> {
        let pos = graph.node(node).position;
        let eps = graph.tolerances().intersection_eps;

        // Any edge with an endpoint within the epsilon counts as connected.
        let mut segments: Vec<EdgeId> = Vec::new();
        for near in graph.nodes_within(pos, eps) {
            for &eid in &graph.node(near).edges {
                if graph.edge(eid).enabled && !segments.contains(&eid) {
                    segments.push(eid);
                }
            }
        }
        segments.sort_unstable();

        let existing = self.find_record_near(pos, eps);
        let Some(kind) = IntersectionKind::from_degree(segments.len()) else {
            if let Some(rid) = existing {
                self.records[rid.raw() as usize].enabled = false;
            }
            return None;
        };

        let orientation = mean_incident_angle(graph, pos, &segments);
        let radius = 0.75
            * segments
                .iter()
                .map(|&e| graph.edge(e).width)
                .fold(0.0f64, f64::max);

        match existing {
            Some(rid) => {
                let rec = &mut self.records[rid.raw() as usize];
                rec.position = pos;
                rec.segments = segments;
                rec.kind = kind;
                rec.orientation = orientation;
                rec.radius = radius;
                rec.enabled = true;
                Some(rid)
            }
            None => {
                let rid = IntersectionId::new(self.records.len() as u32);
                self.records.push(IntersectionRecord {
                    position: pos,
                    segments,
                    kind,
                    orientation,
                    radius,
                    enabled: true,
                });
                Some(rid)
            }
        }
    }

    fn find_record_near(&self, p: DVec2, eps: f64) -> Option<IntersectionId> {
        let mut best: Option<(f64, IntersectionId)> = None;
        for (i, rec) in self.records.iter().enumerate() {
            if !rec.enabled {
                continue;
            }
            let d = rec.position.distance(p);
            if d <= eps {
                match best {
                    Some((bd, _)) if bd <= d => {}
                    _ => best = Some((d, IntersectionId::new(i as u32))),
                }
            }
        }
        best.map(|(_, id)| id)
    }

    /// Rebuild the whole table from graph state. Used after bulk layout
    /// passes that merge or jitter nodes behind the welder's back.
    pub fn rebuild(&mut self, graph: &RoadGraph) {
        self.records.clear();
        let ids: Vec<NodeId> = graph.iter_enabled_nodes().map(|(id, _)| id).collect();
        for id in ids {
            if graph.node(id).degree() >= 2 {
                self.refresh_at(graph, id);
            }
        }
    }

    /// Distance from `p` to the nearest enabled edge, with the edge id.
    pub fn nearest_edge(&self, graph: &RoadGraph, p: DVec2) -> Option<(EdgeId, f64)> {
        let mut best: Option<(EdgeId, f64)> = None;
        for (eid, edge) in graph.iter_enabled_edges() {
            let d = dist_point_to_segment(
                p,
                graph.node(edge.a).position,
                graph.node(edge.b).position,
            );
            match best {
                Some((_, bd)) if bd <= d => {}
                _ => best = Some((eid, d)),
            }
        }
        best
    }
}

impl Default for Welder {
    fn default() -> Self {
        Self::new()
    }
}

/// Circular mean of incident segment bearings at a junction, radians in
/// [-pi, pi]. Unit vectors are accumulated and the mean taken as the
/// atan2 of their sum, so arms straddling the +-pi branch cut average
/// correctly (two roughly-west arms mean west, not east).
fn mean_incident_angle(graph: &RoadGraph, pos: DVec2, segments: &[EdgeId]) -> f64 {
    if segments.is_empty() {
        return 0.0;
    }
    let mut sum = DVec2::ZERO;
    for &eid in segments {
        let e = graph.edge(eid);
        let (pa, pb) = (graph.node(e.a).position, graph.node(e.b).position);
        // Direction pointing away from the junction.
        let dir = if pa.distance(pos) <= pb.distance(pos) {
            pb - pa
        } else {
            pa - pb
        };
        sum += dir.normalize_or_zero();
    }
    sum.y.atan2(sum.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tolerances;

    fn setup() -> (RoadGraph, Welder) {
        (RoadGraph::new(Tolerances::default()), Welder::new())
    }

    #[test]
    fn test_simple_segment_no_crossing() {
        let (mut g, mut w) = setup();
        let out = w.add_segment(
            &mut g,
            DVec2::new(0.0, 0.0),
            DVec2::new(100.0, 0.0),
            RoadClass::Street,
            RoadMaterial::Asphalt,
        );
        assert!(out.success());
        assert_eq!(out.new_edges.len(), 1);
        assert_eq!(g.enabled_node_count(), 2);
        // Two endpoints of a lone segment are not intersections.
        assert_eq!(w.enabled_count(), 0);
    }

    #[test]
    fn test_cross_weld_splits_both() {
        let (mut g, mut w) = setup();
        w.add_segment(
            &mut g,
            DVec2::new(500.0, 500.0),
            DVec2::new(1500.0, 500.0),
            RoadClass::Street,
            RoadMaterial::Asphalt,
        );
        assert_eq!(g.enabled_node_count(), 2);

        let out = w.add_segment(
            &mut g,
            DVec2::new(1000.0, 100.0),
            DVec2::new(1000.0, 900.0),
            RoadClass::Street,
            RoadMaterial::Asphalt,
        );
        assert!(out.success());

        // 5 nodes: four road ends plus the welded crossing.
        assert_eq!(g.enabled_node_count(), 5);
        assert_eq!(g.enabled_edge_count(), 4);

        let x = g
            .nearest_node(DVec2::new(1000.0, 500.0), 1.0)
            .expect("crossing node exists");
        assert!(g.node(x).position.distance(DVec2::new(1000.0, 500.0)) < 1e-6);
        assert!(g.node(x).is_intersection);
        assert_eq!(g.node(x).degree(), 4);

        // One intersection record: a cross with radius 0.75 * 12.
        assert_eq!(w.enabled_count(), 1);
        let (_, rec) = w.iter_enabled().next().unwrap();
        assert_eq!(rec.kind, IntersectionKind::Cross);
        assert_eq!(rec.segments.len(), 4);
        assert!((rec.radius - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_segment_rejected() {
        let (mut g, mut w) = setup();
        let out = w.add_segment(
            &mut g,
            DVec2::new(500.0, 500.0),
            DVec2::new(500.0, 500.0),
            RoadClass::Street,
            RoadMaterial::Asphalt,
        );
        assert!(!out.success());
        assert_eq!(out.rejections, vec![EdgeRejection::Degenerate]);
        assert_eq!(g.enabled_node_count(), 0);
    }

    #[test]
    fn test_endpoint_snap_reuses_node() {
        let (mut g, mut w) = setup();
        w.add_segment(
            &mut g,
            DVec2::new(0.0, 0.0),
            DVec2::new(100.0, 0.0),
            RoadClass::Street,
            RoadMaterial::Asphalt,
        );
        // New start within the snap threshold of (100, 0).
        let out = w.add_segment(
            &mut g,
            DVec2::new(108.0, 0.0),
            DVec2::new(200.0, 80.0),
            RoadClass::Street,
            RoadMaterial::Asphalt,
        );
        assert!(out.success());
        assert_eq!(g.enabled_node_count(), 3);
        let shared = g.nearest_node(DVec2::new(100.0, 0.0), 1.0).unwrap();
        assert_eq!(g.node(shared).degree(), 2);
        // Shared endpoint now has a record of kind End.
        let (_, rec) = w.iter_enabled().next().unwrap();
        assert_eq!(rec.kind, IntersectionKind::End);
    }

    #[test]
    fn test_crossing_near_endpoint_not_split() {
        let (mut g, mut w) = setup();
        w.add_segment(
            &mut g,
            DVec2::new(0.0, 0.0),
            DVec2::new(100.0, 0.0),
            RoadClass::Street,
            RoadMaterial::Asphalt,
        );
        // Vertical span crossing 1 m from the existing endpoint: inside the
        // weld epsilon, so no split happens; the span itself still lands.
        let out = w.add_segment(
            &mut g,
            DVec2::new(99.0, -50.0),
            DVec2::new(99.0, 50.0),
            RoadClass::Street,
            RoadMaterial::Asphalt,
        );
        assert!(out.success());
        assert!(out.rebuilt_edges.is_empty());
    }

    #[test]
    fn test_split_then_insert_matches_whole_insert() {
        // Inserting a whole span then a crossing through its midpoint must
        // produce the same adjacency as inserting the two halves directly.
        let (mut g1, mut w1) = setup();
        w1.add_segment(
            &mut g1,
            DVec2::new(0.0, 500.0),
            DVec2::new(1000.0, 500.0),
            RoadClass::Street,
            RoadMaterial::Asphalt,
        );
        w1.add_segment(
            &mut g1,
            DVec2::new(500.0, 0.0),
            DVec2::new(500.0, 1000.0),
            RoadClass::Street,
            RoadMaterial::Asphalt,
        );

        let (mut g2, mut w2) = setup();
        w2.add_segment(
            &mut g2,
            DVec2::new(0.0, 500.0),
            DVec2::new(500.0, 500.0),
            RoadClass::Street,
            RoadMaterial::Asphalt,
        );
        w2.add_segment(
            &mut g2,
            DVec2::new(500.0, 500.0),
            DVec2::new(1000.0, 500.0),
            RoadClass::Street,
            RoadMaterial::Asphalt,
        );
        w2.add_segment(
            &mut g2,
            DVec2::new(500.0, 0.0),
            DVec2::new(500.0, 1000.0),
            RoadClass::Street,
            RoadMaterial::Asphalt,
        );

        assert_eq!(g1.enabled_node_count(), g2.enabled_node_count());
        assert_eq!(g1.enabled_edge_count(), g2.enabled_edge_count());
        // Same node positions, pairwise.
        let mut p1: Vec<(i64, i64)> = g1
            .iter_enabled_nodes()
            .map(|(_, n)| (n.position.x.round() as i64, n.position.y.round() as i64))
            .collect();
        let mut p2: Vec<(i64, i64)> = g2
            .iter_enabled_nodes()
            .map(|(_, n)| (n.position.x.round() as i64, n.position.y.round() as i64))
            .collect();
        p1.sort_unstable();
        p2.sort_unstable();
        assert_eq!(p1, p2);
    }

    #[test]
    fn test_repeat_paint_is_idempotent() {
        let (mut g, mut w) = setup();
        w.add_segment(
            &mut g,
            DVec2::new(0.0, 0.0),
            DVec2::new(100.0, 0.0),
            RoadClass::Street,
            RoadMaterial::Asphalt,
        );
        let nodes = g.enabled_node_count();
        let edges = g.enabled_edge_count();
        let out = w.add_segment(
            &mut g,
            DVec2::new(0.0, 0.0),
            DVec2::new(100.0, 0.0),
            RoadClass::Street,
            RoadMaterial::Asphalt,
        );
        // Duplicate suppression: same edge handed back, nothing new.
        assert_eq!(g.enabled_node_count(), nodes);
        assert_eq!(g.enabled_edge_count(), edges);
        assert_eq!(out.new_edges.len(), 1);
    }

    #[test]
    fn test_multi_crossing_ladder() {
        let (mut g, mut w) = setup();
        // Three vertical rails.
        for x in [200.0, 400.0, 600.0] {
            w.add_segment(
                &mut g,
                DVec2::new(x, 0.0),
                DVec2::new(x, 400.0),
                RoadClass::Street,
                RoadMaterial::Asphalt,
            );
        }
        // One horizontal span crossing all three.
        let out = w.add_segment(
            &mut g,
            DVec2::new(100.0, 200.0),
            DVec2::new(700.0, 200.0),
            RoadClass::Avenue,
            RoadMaterial::Asphalt,
        );
        assert!(out.success());
        assert_eq!(out.new_edges.len(), 4);
        assert_eq!(out.rebuilt_edges.len(), 6);
        // 6 rail endpoints + 3 crossings + 2 span endpoints.
        assert_eq!(g.enabled_node_count(), 11);
        assert_eq!(w.enabled_count(), 3);
        for (_, rec) in w.iter_enabled() {
            assert_eq!(rec.kind, IntersectionKind::Cross);
            // Avenue is the widest incident road.
            assert!((rec.radius - 12.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_orientation_wraps_across_branch_cut() {
        // Two arms at +150 and -150 degrees both point roughly west; the
        // mean bearing must come out at +-180, not 0 (east), which is what
        // naively averaging the raw angles would give.
        let (mut g, mut w) = setup();
        let center = DVec2::new(500.0, 500.0);
        for angle in [150f64.to_radians(), (-150f64).to_radians()] {
            w.add_segment(
                &mut g,
                center,
                center + DVec2::new(angle.cos(), angle.sin()) * 100.0,
                RoadClass::Street,
                RoadMaterial::Asphalt,
            );
        }

        assert_eq!(w.enabled_count(), 1);
        let (_, rec) = w.iter_enabled().next().unwrap();
        assert_eq!(rec.kind, IntersectionKind::End);
        assert!(
            (rec.orientation.abs() - std::f64::consts::PI).abs() < 1e-6,
            "orientation {} should wrap to +-pi",
            rec.orientation
        );
    }

    #[test]
    fn test_incident_segments_near_record() {
        let (mut g, mut w) = setup();
        w.add_segment(
            &mut g,
            DVec2::new(0.0, 0.0),
            DVec2::new(200.0, 0.0),
            RoadClass::Street,
            RoadMaterial::Asphalt,
        );
        w.add_segment(
            &mut g,
            DVec2::new(100.0, -100.0),
            DVec2::new(100.0, 100.0),
            RoadClass::Street,
            RoadMaterial::Asphalt,
        );
        for (_, rec) in w.iter_enabled() {
            for &eid in &rec.segments {
                let e = g.edge(eid);
                let da = g.node(e.a).position.distance(rec.position);
                let db = g.node(e.b).position.distance(rec.position);
                assert!(da.min(db) <= g.tolerances().intersection_eps);
            }
        }
    }
}
