//! Road graph storage and topology commands.
//!
//! Flat tables indexed by stable ids; removal disables rather than deletes.
//! All commands are total functions on the graph state: `add_edge` returns
//! a rejection value instead of failing partway.

use glam::DVec2;

use crate::config::Tolerances;
use crate::geom::SpatialGrid;
use crate::roads::road_structs::*;

pub struct RoadGraph {
    pub nodes: Vec<RoadNode>,
    pub edges: Vec<RoadEdge>,
    node_index: SpatialGrid,
    tol: Tolerances,
}

impl RoadGraph {
    pub fn new(tol: Tolerances) -> Self {
        let cell = tol.cell_size;
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            node_index: SpatialGrid::new(cell),
            tol,
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.node_index.clear();
    }

    #[inline]
    pub fn tolerances(&self) -> &Tolerances {
        &self.tol
    }

    // ------------------------------------------------------------------------
    // Node operations
    // ------------------------------------------------------------------------

    /// Snap-insert: reuse the nearest enabled node within the snap threshold,
    /// otherwise allocate a new node and index it.
    pub fn add_node(&mut self, p: DVec2) -> NodeId {
        if let Some(existing) = self.nearest_node(p, self.tol.snap_threshold) {
            return existing;
        }
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(RoadNode::new(p));
        self.node_index.insert(id.raw() as u64, p);
        id
    }

    /// Insert a node at exactly `p`, bypassing the paint snap. The welder
    /// uses this for crossing points, which must stay on the crossed edge.
    pub fn add_node_exact(&mut self, p: DVec2) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(RoadNode::new(p));
        self.node_index.insert(id.raw() as u64, p);
        id
    }

    /// Nearest enabled node within `radius` of `p`, if any.
    pub fn nearest_node(&self, p: DVec2, radius: f64) -> Option<NodeId> {
        let mut best: Option<(f64, NodeId)> = None;
        for raw in self.node_index.nearby(p, radius) {
            let id = NodeId::new(raw as u32);
            let node = &self.nodes[raw as usize];
            if !node.enabled {
                continue;
            }
            let d = node.position.distance(p);
            if d <= radius {
                match best {
                    Some((bd, _)) if bd <= d => {}
                    _ => best = Some((d, id)),
                }
            }
        }
        best.map(|(_, id)| id)
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &RoadNode {
        &self.nodes[id.raw() as usize]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut RoadNode {
        &mut self.nodes[id.raw() as usize]
    }

    #[inline]
    pub fn edge(&self, id: EdgeId) -> &RoadEdge {
        &self.edges[id.raw() as usize]
    }

    #[inline]
    pub fn edge_mut(&mut self, id: EdgeId) -> &mut RoadEdge {
        &mut self.edges[id.raw() as usize]
    }

    pub fn iter_enabled_nodes(&self) -> impl Iterator<Item = (NodeId, &RoadNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.enabled)
            .map(|(i, n)| (NodeId::new(i as u32), n))
    }

    pub fn iter_enabled_edges(&self) -> impl Iterator<Item = (EdgeId, &RoadEdge)> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.enabled)
            .map(|(i, e)| (EdgeId::new(i as u32), e))
    }

    pub fn enabled_node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.enabled).count()
    }

    pub fn enabled_edge_count(&self) -> usize {
        self.edges.iter().filter(|e| e.enabled).count()
    }

    pub fn total_length(&self) -> f64 {
        self.edges.iter().filter(|e| e.enabled).map(|e| e.length).sum()
    }

    // ------------------------------------------------------------------------
    // Edge operations
    // ------------------------------------------------------------------------

    /// Unit direction of `edge` pointing away from `node`.
    pub fn edge_direction_from(&self, edge: EdgeId, node: NodeId) -> DVec2 {
        let e = self.edge(edge);
        let other = e.other(node).unwrap_or(e.b);
        (self.node(other).position - self.node(node).position).normalize_or_zero()
    }

    /// Existing enabled edge between `a` and `b`, if any.
    pub fn find_edge(&self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        self.node(a)
            .edges
            .iter()
            .copied()
            .find(|&eid| self.edge(eid).enabled && self.edge(eid).connects(a, b))
    }

    /// Insert an edge between two existing nodes, enforcing the minimum
    /// separation angle at both endpoints. Duplicate edges are returned
    /// unchanged; `a == b` is rejected as degenerate.
    pub fn add_edge(
        &mut self,
        a: NodeId,
        b: NodeId,
        class: RoadClass,
        material: RoadMaterial,
    ) -> Result<EdgeId, EdgeRejection> {
        if a == b {
            return Err(EdgeRejection::Degenerate);
        }
        if let Some(existing) = self.find_edge(a, b) {
            return Ok(existing);
        }

        let pa = self.node(a).position;
        let pb = self.node(b).position;
        if pa.distance(pb) < 1e-9 {
            return Err(EdgeRejection::Degenerate);
        }

        let dir_ab = (pb - pa).normalize();
        if !self.angle_ok(a, dir_ab) || !self.angle_ok(b, -dir_ab) {
            return Err(EdgeRejection::AngleTooAcute);
        }

        let id = EdgeId::new(self.edges.len() as u32);
        self.edges.push(RoadEdge {
            a,
            b,
            class,
            material,
            width: class.width(),
            length: pa.distance(pb),
            enabled: true,
        });
        self.attach(a, id);
        self.attach(b, id);
        Ok(id)
    }

    /// True iff `dir` clears the minimum angle against every enabled edge
    /// already incident to `node`.
    pub fn angle_ok(&self, node: NodeId, dir: DVec2) -> bool {
        for &eid in &self.node(node).edges {
            if !self.edge(eid).enabled {
                continue;
            }
            let other_dir = self.edge_direction_from(eid, node);
            let angle = other_dir.dot(dir).clamp(-1.0, 1.0).acos();
            if angle < self.tol.min_angle {
                return false;
            }
        }
        true
    }

    fn attach(&mut self, node: NodeId, edge: EdgeId) {
        let n = self.node_mut(node);
        n.edges.push(edge);
        n.is_intersection = n.edges.len() >= 2;
    }

    fn detach(&mut self, node: NodeId, edge: EdgeId) {
        let n = self.node_mut(node);
        n.edges.retain(|&e| e != edge);
        n.is_intersection = n.edges.len() >= 2;
    }

    /// Disable an edge and drop it from both incidence sets.
    pub fn remove_edge(&mut self, id: EdgeId) {
        if !self.edge(id).enabled {
            return;
        }
        let (a, b) = {
            let e = self.edge(id);
            (e.a, e.b)
        };
        self.edge_mut(id).enabled = false;
        self.detach(a, id);
        self.detach(b, id);
    }

    /// Rewire every edge incident to `from` onto `to`, dropping edges that
    /// become loops or duplicates, then disable `from`.
    pub fn merge_nodes(&mut self, from: NodeId, to: NodeId) {
        if from == to || !self.node(from).enabled {
            return;
        }
        let incident: Vec<EdgeId> = self.node(from).edges.clone();
        for eid in incident {
            let (a, b) = {
                let e = self.edge(eid);
                (e.a, e.b)
            };
            let other = if a == from { b } else { a };
            self.detach(from, eid);

            if other == to {
                // Collapses to a loop.
                self.edge_mut(eid).enabled = false;
                self.detach(other, eid);
                continue;
            }
            if self.find_edge(other, to).is_some() {
                // Duplicate of an existing connection.
                self.edge_mut(eid).enabled = false;
                self.detach(other, eid);
                continue;
            }
            {
                let to_pos = self.node(to).position;
                let other_pos = self.node(other).position;
                let e = self.edge_mut(eid);
                if e.a == from {
                    e.a = to;
                } else {
                    e.b = to;
                }
                e.length = to_pos.distance(other_pos);
            }
            self.attach(to, eid);
        }

        let pos = self.node(from).position;
        self.node_mut(from).enabled = false;
        self.node_mut(from).is_intersection = false;
        self.node_index.remove(from.raw() as u64, pos);
    }

    /// Move a node, refreshing the index and cached edge lengths.
    pub fn move_node(&mut self, id: NodeId, p: DVec2) {
        let old = self.node(id).position;
        self.node_index.remove(id.raw() as u64, old);
        self.node_mut(id).position = p;
        self.node_index.insert(id.raw() as u64, p);
        let incident: Vec<EdgeId> = self.node(id).edges.clone();
        for eid in incident {
            let (a, b) = {
                let e = self.edge(eid);
                (e.a, e.b)
            };
            let len = self.node(a).position.distance(self.node(b).position);
            self.edge_mut(eid).length = len;
        }
    }

    /// Rebuild the node index from live node state. Used after bulk merges.
    pub fn rebuild_index(&mut self) {
        self.node_index.clear();
        for (i, n) in self.nodes.iter().enumerate() {
            if n.enabled {
                self.node_index.insert(i as u64, n.position);
            }
        }
    }

    /// Enabled node ids within `radius` of `p`.
    pub fn nodes_within(&self, p: DVec2, radius: f64) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .node_index
            .nearby(p, radius)
            .into_iter()
            .map(|raw| NodeId::new(raw as u32))
            .filter(|&id| {
                let n = self.node(id);
                n.enabled && n.position.distance(p) <= radius
            })
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Connected components over enabled nodes, largest first.
    pub fn connected_components(&self) -> Vec<Vec<NodeId>> {
        let mut visited = vec![false; self.nodes.len()];
        let mut components = Vec::new();

        for start in 0..self.nodes.len() {
            if visited[start] || !self.nodes[start].enabled {
                continue;
            }
            let mut stack = vec![NodeId::new(start as u32)];
            let mut comp = Vec::new();
            visited[start] = true;
            while let Some(id) = stack.pop() {
                comp.push(id);
                for &eid in &self.node(id).edges {
                    if !self.edge(eid).enabled {
                        continue;
                    }
                    if let Some(next) = self.edge(eid).other(id) {
                        if !visited[next.raw() as usize] && self.node(next).enabled {
                            visited[next.raw() as usize] = true;
                            stack.push(next);
                        }
                    }
                }
            }
            comp.sort_unstable();
            components.push(comp);
        }

        components.sort_by_key(|c| std::cmp::Reverse(c.len()));
        components
    }
}
