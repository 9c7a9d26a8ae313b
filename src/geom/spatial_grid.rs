//! Uniform-grid bucket index for point sets.
//!
//! Shared by the road graph (node snapping) and the layout generator
//! (empty-region scans). Single writer; `nearby` over-approximates by
//! cell ring, callers filter by exact distance.

use glam::DVec2;
use std::collections::HashMap;

pub struct SpatialGrid {
    cell_size: f64,
    buckets: HashMap<(i32, i32), Vec<u64>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: cell_size.max(1e-6),
            buckets: HashMap::new(),
        }
    }

    #[inline]
    fn cell_of(&self, p: DVec2) -> (i32, i32) {
        (
            (p.x / self.cell_size).floor() as i32,
            (p.y / self.cell_size).floor() as i32,
        )
    }

    pub fn insert(&mut self, id: u64, p: DVec2) {
        self.buckets.entry(self.cell_of(p)).or_default().push(id);
    }

    /// Remove one occurrence of `id` from the bucket containing `p`.
    /// The position must match the one used at insert time.
    pub fn remove(&mut self, id: u64, p: DVec2) {
        let cell = self.cell_of(p);
        if let Some(bucket) = self.buckets.get_mut(&cell) {
            if let Some(idx) = bucket.iter().position(|&x| x == id) {
                bucket.swap_remove(idx);
            }
            if bucket.is_empty() {
                self.buckets.remove(&cell);
            }
        }
    }

    /// Candidate ids within `radius` of `p`, by cell ring. Order is
    /// deterministic (row-major cells, insertion order within a bucket);
    /// callers filter by exact distance.
    pub fn nearby(&self, p: DVec2, radius: f64) -> Vec<u64> {
        let ring = (radius / self.cell_size).ceil() as i32;
        let (cx, cy) = self.cell_of(p);
        let mut out = Vec::new();
        for dy in -ring..=ring {
            for dx in -ring..=ring {
                if let Some(bucket) = self.buckets.get(&(cx + dx, cy + dy)) {
                    out.extend_from_slice(bucket);
                }
            }
        }
        out
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
