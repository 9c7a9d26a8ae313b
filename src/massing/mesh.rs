//! Component mesh assembly.
//!
//! Planar footprints live in the xy ground plane; meshes are emitted in a
//! y-up frame, so a planar point (x, y) at height h becomes (x, h, y).
//! Walls and lofts are quads split into two triangles, caps are fan
//! triangulated, and per-vertex normals come from face-normal accumulation.
//! Faces do not share vertices across components, so accumulation yields
//! flat shading per face.

use glam::{DVec2, DVec3};

use crate::geom::{offset_polygon_inward, oriented_bounding_box, polygon_perimeter};
use crate::massing::massing_structs::Material;

/// Flat mesh buffers in the reply layout: positions/normals are xyz
/// triplets, uvs pairs, one material code per triangle.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub indices: Vec<u32>,
    pub material_ids: Vec<u8>,
}

impl MeshData {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Byte views for zero-copy transport.
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

pub(crate) struct MeshBuilder {
    positions: Vec<DVec3>,
    uvs: Vec<[f64; 2]>,
    indices: Vec<u32>,
    material_ids: Vec<u8>,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            uvs: Vec::new(),
            indices: Vec::new(),
            material_ids: Vec::new(),
        }
    }

    fn vertex(&mut self, p: DVec3, uv: [f64; 2]) -> u32 {
        let id = self.positions.len() as u32;
        self.positions.push(p);
        self.uvs.push(uv);
        id
    }

    fn tri(&mut self, a: u32, b: u32, c: u32, mat: Material) {
        self.indices.extend_from_slice(&[a, b, c]);
        self.material_ids.push(mat.code());
    }

    fn quad(&mut self, a: u32, b: u32, c: u32, d: u32, mat: Material) {
        self.tri(a, b, c, mat);
        self.tri(a, c, d, mat);
    }

    /// Loft between two rings of equal length: `lower[i]` connects to
    /// `upper[i]`. Outward winding assumes planar-CCW rings.
    pub fn loft(&mut self, lower: &[(DVec2, f64)], upper: &[(DVec2, f64)], mat: Material) {
        let n = lower.len();
        if n < 3 || upper.len() != n {
            return;
        }
        let mut dist = 0.0;
        for i in 0..n {
            let j = (i + 1) % n;
            let (la, ha) = lower[i];
            let (lb, hb) = lower[j];
            let (ua, ka) = upper[i];
            let (ub, kb) = upper[j];
            let seg = la.distance(lb);

            let v0 = self.vertex(DVec3::new(la.x, ha, la.y), [dist, ha]);
            let v1 = self.vertex(DVec3::new(ua.x, ka, ua.y), [dist, ka]);
            let v2 = self.vertex(DVec3::new(ub.x, kb, ub.y), [dist + seg, kb]);
            let v3 = self.vertex(DVec3::new(lb.x, hb, lb.y), [dist + seg, hb]);
            self.quad(v0, v1, v2, v3, mat);
            dist += seg;
        }
    }

    /// Vertical wall band from h0 to h1 around a planar ring.
    pub fn wall_band(&mut self, ring: &[DVec2], h0: f64, h1: f64, mat: Material) {
        let lower: Vec<(DVec2, f64)> = ring.iter().map(|&p| (p, h0)).collect();
        let upper: Vec<(DVec2, f64)> = ring.iter().map(|&p| (p, h1)).collect();
        self.loft(&lower, &upper, mat);
    }

    /// Horizontal fan cap at height `h`. `up` selects the facing.
    pub fn cap(&mut self, ring: &[DVec2], h: f64, mat: Material, up: bool) {
        let n = ring.len();
        if n < 3 {
            return;
        }
        let ids: Vec<u32> = ring
            .iter()
            .map(|&p| self.vertex(DVec3::new(p.x, h, p.y), [p.x * 0.1, p.y * 0.1]))
            .collect();
        for i in 1..n - 1 {
            if up {
                // Planar-CCW fans face down in the y-up frame; flip.
                self.tri(ids[0], ids[i + 1], ids[i], mat);
            } else {
                self.tri(ids[0], ids[i], ids[i + 1], mat);
            }
        }
    }

    /// Axis-aligned-to-`along` box: four walls and a lid. Used for
    /// balconies and loading docks.
    pub fn detail_box(
        &mut self,
        center: DVec2,
        along: DVec2,
        half_w: f64,
        half_d: f64,
        h0: f64,
        h1: f64,
        mat: Material,
    ) {
        let perp = DVec2::new(-along.y, along.x);
        let ring = [
            center - along * half_w - perp * half_d,
            center + along * half_w - perp * half_d,
            center + along * half_w + perp * half_d,
            center - along * half_w + perp * half_d,
        ];
        self.wall_band(&ring, h0, h1, mat);
        self.cap(&ring, h1, mat, true);
    }

    /// Accumulate face normals onto vertices, normalize, convert to f32.
    pub fn finish(self) -> MeshData {
        let mut normals = vec![DVec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let face = (self.positions[b] - self.positions[a])
                .cross(self.positions[c] - self.positions[a]);
            normals[a] += face;
            normals[b] += face;
            normals[c] += face;
        }

        let mut out = MeshData {
            positions: Vec::with_capacity(self.positions.len() * 3),
            normals: Vec::with_capacity(self.positions.len() * 3),
            uvs: Vec::with_capacity(self.positions.len() * 2),
            indices: self.indices,
            material_ids: self.material_ids,
        };
        for (p, n) in self.positions.iter().zip(normals.iter()) {
            let n = n.normalize_or_zero();
            out.positions
                .extend_from_slice(&[p.x as f32, p.y as f32, p.z as f32]);
            out.normals
                .extend_from_slice(&[n.x as f32, n.y as f32, n.z as f32]);
        }
        for uv in &self.uvs {
            out.uvs.extend_from_slice(&[uv[0] as f32, uv[1] as f32]);
        }
        out
    }
}

// ----------------------------------------------------------------------------
// Roof emitters
// ----------------------------------------------------------------------------

/// Flat roof: parapet band plus top cap.
pub(crate) fn roof_flat(b: &mut MeshBuilder, ring: &[DVec2], h0: f64, h1: f64, mat: Material) {
    b.wall_band(ring, h0, h1, mat);
    b.cap(ring, h1, mat, true);
}

/// Shared ridge loft: gable (long ridge), hip (short ridge), pyramid
/// (ridge collapsed to the apex). Every eave vertex connects to its
/// clamped projection on the ridge segment.
pub(crate) fn roof_ridge(
    b: &mut MeshBuilder,
    ring: &[DVec2],
    h0: f64,
    h1: f64,
    ridge_factor: f64,
    mat: Material,
) {
    let n = ring.len();
    if n < 3 {
        return;
    }
    let obb = oriented_bounding_box(ring);
    let half_ridge = obb.half_extents.x * ridge_factor;
    let r0 = obb.center - obb.axis * half_ridge;
    let r1 = obb.center + obb.axis * half_ridge;

    let target = |p: DVec2| -> DVec2 {
        if half_ridge < 1e-9 {
            return obb.center;
        }
        let t = crate::geom::project_param(p, r0, r1).clamp(0.0, 1.0);
        r0 + (r1 - r0) * t
    };

    let upper: Vec<(DVec2, f64)> = ring.iter().map(|&p| (target(p), h1)).collect();
    let lower: Vec<(DVec2, f64)> = ring.iter().map(|&p| (p, h0)).collect();
    b.loft(&lower, &upper, mat);
}

/// Two-band mansard: a steep lower slope to most of the roof height, a
/// shallower upper slope, then a cap. Falls back to a flat cap when the
/// inset collapses the ring.
pub(crate) fn roof_mansard(b: &mut MeshBuilder, ring: &[DVec2], h0: f64, h1: f64, mat: Material) {
    let rise = h1 - h0;
    let inset = (polygon_perimeter(ring) * 0.02).clamp(0.6, 2.5);

    let mid_ring = offset_polygon_inward(ring, inset);
    if mid_ring.len() < 3 || crate::geom::polygon_area(&mid_ring) < 1.0 {
        b.cap(ring, h0, mat, true);
        return;
    }
    let top_ring = offset_polygon_inward(ring, inset * 1.6);
    let mid_h = h0 + rise * 0.7;

    let eave: Vec<(DVec2, f64)> = ring.iter().map(|&p| (p, h0)).collect();
    let mid: Vec<(DVec2, f64)> = mid_ring.iter().map(|&p| (p, mid_h)).collect();
    b.loft(&eave, &mid, mat);

    if top_ring.len() == mid_ring.len() && crate::geom::polygon_area(&top_ring) >= 1.0 {
        let top: Vec<(DVec2, f64)> = top_ring.iter().map(|&p| (p, h1)).collect();
        b.loft(&mid, &top, mat);
        b.cap(&top_ring, h1, mat, true);
    } else {
        b.cap(&mid_ring, mid_h, mat, true);
    }
}

/// Quarter-circle loft approximating a barrel vault.
pub(crate) fn roof_barrel(b: &mut MeshBuilder, ring: &[DVec2], h0: f64, h1: f64, mat: Material) {
    const STEPS: usize = 4;
    let rise = h1 - h0;
    let obb = oriented_bounding_box(ring);
    let reach = obb.half_extents.y * 0.85;

    let mut prev: Vec<(DVec2, f64)> = ring.iter().map(|&p| (p, h0)).collect();
    let mut prev_ring = ring.to_vec();
    for step in 1..=STEPS {
        let t = step as f64 / STEPS as f64;
        let angle = t * std::f64::consts::FRAC_PI_2;
        let next_ring = offset_polygon_inward(ring, reach * (1.0 - angle.cos()));
        if next_ring.len() != prev.len() || crate::geom::polygon_area(&next_ring) < 1.0 {
            break;
        }
        let h = h0 + rise * angle.sin();
        let next: Vec<(DVec2, f64)> = next_ring.iter().map(|&p| (p, h)).collect();
        b.loft(&prev, &next, mat);
        prev = next;
        prev_ring = next_ring;
    }
    let top_h = prev.first().map(|&(_, h)| h).unwrap_or(h1);
    b.cap(&prev_ring, top_h, mat, true);
}

/// Repeating triangular teeth across the footprint's oriented box, sealed
/// by an eave-height cap under them.
pub(crate) fn roof_sawtooth(b: &mut MeshBuilder, ring: &[DVec2], h0: f64, h1: f64, mat: Material) {
    b.cap(ring, h0, mat, true);

    let obb = oriented_bounding_box(ring);
    let major = obb.half_extents.x * 2.0;
    let teeth = ((major / 6.0).round() as usize).clamp(2, 8);
    let tooth_w = major / teeth as f64;
    let perp = DVec2::new(-obb.axis.y, obb.axis.x);
    let rise = h1 - h0;

    for i in 0..teeth {
        let a0 = -obb.half_extents.x + tooth_w * i as f64;
        let a1 = a0 + tooth_w;
        // Corners of this tooth strip on the oriented box.
        let p00 = obb.center + obb.axis * a0 - perp * obb.half_extents.y;
        let p01 = obb.center + obb.axis * a0 + perp * obb.half_extents.y;
        let p10 = obb.center + obb.axis * a1 - perp * obb.half_extents.y;
        let p11 = obb.center + obb.axis * a1 + perp * obb.half_extents.y;

        // Vertical face at the leading edge.
        let v0 = b.vertex(DVec3::new(p00.x, h0, p00.y), [0.0, h0]);
        let v1 = b.vertex(DVec3::new(p00.x, h0 + rise, p00.y), [0.0, h0 + rise]);
        let v2 = b.vertex(
            DVec3::new(p01.x, h0 + rise, p01.y),
            [obb.half_extents.y * 2.0, h0 + rise],
        );
        let v3 = b.vertex(DVec3::new(p01.x, h0, p01.y), [obb.half_extents.y * 2.0, h0]);
        b.quad(v0, v1, v2, v3, mat);

        // Slope down to the trailing edge.
        let s0 = b.vertex(DVec3::new(p00.x, h0 + rise, p00.y), [0.0, 0.0]);
        let s1 = b.vertex(DVec3::new(p10.x, h0, p10.y), [tooth_w, 0.0]);
        let s2 = b.vertex(DVec3::new(p11.x, h0, p11.y), [tooth_w, 1.0]);
        let s3 = b.vertex(DVec3::new(p01.x, h0 + rise, p01.y), [0.0, 1.0]);
        b.quad(s0, s1, s2, s3, mat);

        // Triangular ends.
        let e0 = b.vertex(DVec3::new(p00.x, h0, p00.y), [0.0, 0.0]);
        let e1 = b.vertex(DVec3::new(p10.x, h0, p10.y), [tooth_w, 0.0]);
        let e2 = b.vertex(DVec3::new(p00.x, h0 + rise, p00.y), [0.0, rise]);
        b.tri(e0, e1, e2, mat);
        let f0 = b.vertex(DVec3::new(p01.x, h0, p01.y), [0.0, 0.0]);
        let f1 = b.vertex(DVec3::new(p01.x, h0 + rise, p01.y), [0.0, rise]);
        let f2 = b.vertex(DVec3::new(p11.x, h0, p11.y), [tooth_w, 0.0]);
        b.tri(f0, f1, f2, mat);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Vec<DVec2> {
        vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(size, 0.0),
            DVec2::new(size, size),
            DVec2::new(0.0, size),
        ]
    }

    #[test]
    fn test_wall_band_quad_count() {
        let mut b = MeshBuilder::new();
        b.wall_band(&square(10.0), 0.0, 3.0, Material::Brick);
        let mesh = b.finish();
        // 4 edges, 2 triangles each.
        assert_eq!(mesh.triangle_count(), 8);
        assert_eq!(mesh.material_ids.len(), 8);
        assert!(mesh.material_ids.iter().all(|&m| m == Material::Brick.code()));
        assert_eq!(mesh.positions.len(), mesh.normals.len());
        assert_eq!(mesh.uvs.len() / 2, mesh.vertex_count());
    }

    #[test]
    fn test_wall_normals_point_outward() {
        let mut b = MeshBuilder::new();
        b.wall_band(&square(10.0), 0.0, 3.0, Material::Brick);
        let mesh = b.finish();
        // South wall (first edge y=0) vertices should have -z normals.
        assert!(mesh.normals[2] < -0.9);
    }

    #[test]
    fn test_cap_up_normals() {
        let mut b = MeshBuilder::new();
        b.cap(&square(10.0), 5.0, Material::Asphalt, true);
        let mesh = b.finish();
        assert_eq!(mesh.triangle_count(), 2);
        for v in 0..mesh.vertex_count() {
            assert!(mesh.normals[v * 3 + 1] > 0.9);
        }
    }

    #[test]
    fn test_pyramid_collapses_to_apex() {
        let mut b = MeshBuilder::new();
        roof_ridge(&mut b, &square(10.0), 6.0, 10.0, 0.0, Material::Shingle);
        let mesh = b.finish();
        assert!(!mesh.is_empty());
        // Every top vertex sits at the OBB center.
        let apex_count = (0..mesh.vertex_count())
            .filter(|&v| {
                (mesh.positions[v * 3 + 1] - 10.0).abs() < 1e-4
                    && (mesh.positions[v * 3] - 5.0).abs() < 1e-4
                    && (mesh.positions[v * 3 + 2] - 5.0).abs() < 1e-4
            })
            .count();
        assert!(apex_count >= 4);
    }

    #[test]
    fn test_gable_keeps_ridge_spread() {
        let rect = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(20.0, 0.0),
            DVec2::new(20.0, 8.0),
            DVec2::new(0.0, 8.0),
        ];
        let mut b = MeshBuilder::new();
        roof_ridge(&mut b, &rect, 5.0, 8.0, 0.9, Material::Shingle);
        let mesh = b.finish();
        // Ridge vertices spread along x: distinct top x coordinates exist.
        let mut top_x: Vec<i64> = (0..mesh.vertex_count())
            .filter(|&v| (mesh.positions[v * 3 + 1] - 8.0).abs() < 1e-4)
            .map(|v| (mesh.positions[v * 3] * 10.0).round() as i64)
            .collect();
        top_x.sort_unstable();
        top_x.dedup();
        assert!(top_x.len() >= 2);
    }

    #[test]
    fn test_flat_roof_has_cap() {
        let mut b = MeshBuilder::new();
        roof_flat(&mut b, &square(12.0), 9.0, 10.0, Material::Asphalt);
        let mesh = b.finish();
        // 4 wall quads + 2 cap triangles.
        assert_eq!(mesh.triangle_count(), 10);
    }

    #[test]
    fn test_mansard_two_bands() {
        let mut b = MeshBuilder::new();
        roof_mansard(&mut b, &square(14.0), 10.0, 14.0, Material::Shingle);
        let mesh = b.finish();
        // Two lofts of 4 quads plus the top cap.
        assert!(mesh.triangle_count() >= 16);
        let max_y = (0..mesh.vertex_count())
            .map(|v| mesh.positions[v * 3 + 1])
            .fold(f32::MIN, f32::max);
        assert!((max_y - 14.0).abs() < 1e-3);
    }

    #[test]
    fn test_barrel_rises_to_full_height() {
        let rect = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(30.0, 0.0),
            DVec2::new(30.0, 12.0),
            DVec2::new(0.0, 12.0),
        ];
        let mut b = MeshBuilder::new();
        roof_barrel(&mut b, &rect, 6.0, 10.0, Material::Metal);
        let mesh = b.finish();
        assert!(!mesh.is_empty());
        let max_y = (0..mesh.vertex_count())
            .map(|v| mesh.positions[v * 3 + 1])
            .fold(f32::MIN, f32::max);
        assert!(max_y > 9.0);
    }

    #[test]
    fn test_sawtooth_tooth_count() {
        let rect = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(36.0, 0.0),
            DVec2::new(36.0, 12.0),
            DVec2::new(0.0, 12.0),
        ];
        let mut b = MeshBuilder::new();
        roof_sawtooth(&mut b, &rect, 8.0, 11.0, Material::Metal);
        let mesh = b.finish();
        // 6 teeth (36 / 6): each 2 quads + 2 tris = 6 triangles, plus the
        // 2-triangle seal cap.
        assert_eq!(mesh.triangle_count(), 6 * 6 + 2);
    }

    #[test]
    fn test_degenerate_ring_emits_nothing() {
        let mut b = MeshBuilder::new();
        b.wall_band(&[DVec2::ZERO, DVec2::new(1.0, 0.0)], 0.0, 3.0, Material::Brick);
        b.cap(&[DVec2::ZERO], 1.0, Material::Brick, true);
        let mesh = b.finish();
        assert!(mesh.is_empty());
    }
}
