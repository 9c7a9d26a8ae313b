//! Stateless planar geometry kernel.
//!
//! Everything downstream (graph welding, block finding, subdivision,
//! massing) goes through these primitives. All math is double precision;
//! the mesh layer converts to f32 only at buffer emission.

use glam::DVec2;

/// 2D cross product (z component of the 3D cross).
#[inline]
pub fn cross_2d(a: DVec2, b: DVec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Unsigned polygon area by the shoelace formula.
/// Self-intersecting input is undefined.
pub fn polygon_area(poly: &[DVec2]) -> f64 {
    signed_area(poly).abs()
}

/// Signed shoelace area: positive for CCW winding.
pub fn signed_area(poly: &[DVec2]) -> f64 {
    let n = poly.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        acc += cross_2d(poly[i], poly[j]);
    }
    acc * 0.5
}

#[inline]
pub fn polygon_is_ccw(poly: &[DVec2]) -> bool {
    signed_area(poly) >= 0.0
}

/// Reverse the ring in place if it winds clockwise.
pub fn ensure_ccw(poly: &mut Vec<DVec2>) {
    if signed_area(poly) < 0.0 {
        poly.reverse();
    }
}

pub fn polygon_perimeter(poly: &[DVec2]) -> f64 {
    let n = poly.len();
    if n < 2 {
        return 0.0;
    }
    (0..n).map(|i| poly[i].distance(poly[(i + 1) % n])).sum()
}

/// Signed-area-weighted centroid. Falls back to the vertex mean for
/// near-degenerate rings.
pub fn centroid(poly: &[DVec2]) -> DVec2 {
    let n = poly.len();
    if n == 0 {
        return DVec2::ZERO;
    }
    let area2: f64 = (0..n)
        .map(|i| cross_2d(poly[i], poly[(i + 1) % n]))
        .sum();
    if area2.abs() < 1e-9 {
        return poly.iter().copied().sum::<DVec2>() / n as f64;
    }
    let mut c = DVec2::ZERO;
    for i in 0..n {
        let j = (i + 1) % n;
        let w = cross_2d(poly[i], poly[j]);
        c += (poly[i] + poly[j]) * w;
    }
    c / (3.0 * area2)
}

/// Even-odd ray test. Boundary points are not guaranteed either way, but
/// repeated queries on the same input are consistent.
pub fn point_in_polygon(p: DVec2, poly: &[DVec2]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = poly[i];
        let b = poly[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x_at = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x_at {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Intersection of segments a1-a2 and b1-b2 when both parameters lie in
/// [0, 1] (with `t_eps` slack). Parallel pairs (|denom| < parallel_eps)
/// return None.
pub fn segment_intersect(
    a1: DVec2,
    a2: DVec2,
    b1: DVec2,
    b2: DVec2,
    parallel_eps: f64,
    t_eps: f64,
) -> Option<DVec2> {
    let r = a2 - a1;
    let s = b2 - b1;
    let denom = cross_2d(r, s);
    if denom.abs() < parallel_eps {
        return None;
    }
    let w = b1 - a1;
    let t = cross_2d(w, s) / denom;
    let u = cross_2d(w, r) / denom;
    if t < -t_eps || t > 1.0 + t_eps || u < -t_eps || u > 1.0 + t_eps {
        return None;
    }
    Some(a1 + r * t)
}

/// Intersection of the infinite lines through a1-a2 and b1-b2, with the
/// parameter along a. Parallel lines return None.
pub fn line_intersect_t(
    a1: DVec2,
    a2: DVec2,
    b1: DVec2,
    b2: DVec2,
    parallel_eps: f64,
) -> Option<(f64, DVec2)> {
    let r = a2 - a1;
    let s = b2 - b1;
    let denom = cross_2d(r, s);
    if denom.abs() < parallel_eps {
        return None;
    }
    let t = cross_2d(b1 - a1, s) / denom;
    Some((t, a1 + r * t))
}

/// Distance from `p` to the segment a-b.
pub fn dist_point_to_segment(p: DVec2, a: DVec2, b: DVec2) -> f64 {
    p.distance(closest_point_on_segment(p, a, b))
}

pub fn closest_point_on_segment(p: DVec2, a: DVec2, b: DVec2) -> DVec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-12 {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Parameter t of the closest point on a-b to `p`, unclamped.
pub fn project_param(p: DVec2, a: DVec2, b: DVec2) -> f64 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-12 {
        return 0.0;
    }
    (p - a).dot(ab) / len_sq
}

/// Displace each vertex along the average inward normal of its two incident
/// edges, scaled so the perpendicular offset distance is `d`. A vertex whose
/// edge normals nearly cancel (|sum| < 1e-3) is left in place. No topology
/// repair: callers detect rings collapsed below 3 vertices and skip.
pub fn offset_polygon_inward(poly: &[DVec2], d: f64) -> Vec<DVec2> {
    let n = poly.len();
    if n < 3 {
        return poly.to_vec();
    }
    // Inward for a CCW ring is the left normal of each directed edge.
    let inward_sign = if polygon_is_ccw(poly) { 1.0 } else { -1.0 };

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let prev = poly[(i + n - 1) % n];
        let cur = poly[i];
        let next = poly[(i + 1) % n];

        let d0 = (cur - prev).normalize_or_zero();
        let d1 = (next - cur).normalize_or_zero();
        let n0 = DVec2::new(-d0.y, d0.x) * inward_sign;
        let n1 = DVec2::new(-d1.y, d1.x) * inward_sign;

        let bisector = n0 + n1;
        if bisector.length() < 1e-3 {
            out.push(cur);
            continue;
        }
        let bisector = bisector.normalize();
        // Scale so the perpendicular distance to both edges equals d.
        let cos_half = bisector.dot(n1).max(1e-3);
        out.push(cur + bisector * (d / cos_half));
    }
    out
}

/// Sutherland–Hodgman clip keeping the side where (v - point)·normal >= 0.
pub fn clip_by_half_plane(poly: &[DVec2], point: DVec2, normal: DVec2) -> Vec<DVec2> {
    let n = poly.len();
    if n < 3 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(n + 2);
    for i in 0..n {
        let cur = poly[i];
        let next = poly[(i + 1) % n];
        let d_cur = (cur - point).dot(normal);
        let d_next = (next - point).dot(normal);

        if d_cur >= 0.0 {
            out.push(cur);
        }
        if (d_cur > 0.0 && d_next < 0.0) || (d_cur < 0.0 && d_next > 0.0) {
            let t = d_cur / (d_cur - d_next);
            out.push(cur + (next - cur) * t);
        }
    }
    out
}

/// True iff any vertex of one ring lies inside the other, or any edge pair
/// crosses. Containment of one ring entirely inside the other counts.
pub fn polygon_intersects(a: &[DVec2], b: &[DVec2], parallel_eps: f64, t_eps: f64) -> bool {
    if a.len() < 3 || b.len() < 3 {
        return false;
    }
    if a.iter().any(|&v| point_in_polygon(v, b)) {
        return true;
    }
    if b.iter().any(|&v| point_in_polygon(v, a)) {
        return true;
    }
    let na = a.len();
    let nb = b.len();
    for i in 0..na {
        let a1 = a[i];
        let a2 = a[(i + 1) % na];
        for j in 0..nb {
            let b1 = b[j];
            let b2 = b[(j + 1) % nb];
            if segment_intersect(a1, a2, b1, b2, parallel_eps, t_eps).is_some() {
                return true;
            }
        }
    }
    false
}

/// Axis-aligned bounds of a point set: (min, max).
pub fn polygon_bounds(poly: &[DVec2]) -> (DVec2, DVec2) {
    let mut min = DVec2::splat(f64::MAX);
    let mut max = DVec2::splat(f64::MIN);
    for &p in poly {
        min = min.min(p);
        max = max.max(p);
    }
    (min, max)
}

/// Oriented bounding box from the principal axis of the vertex covariance.
#[derive(Debug, Clone, Copy)]
pub struct Obb {
    pub center: DVec2,
    /// Unit direction of the major axis.
    pub axis: DVec2,
    /// Half extents along (axis, perpendicular).
    pub half_extents: DVec2,
}

pub fn oriented_bounding_box(poly: &[DVec2]) -> Obb {
    let n = poly.len().max(1) as f64;
    let mean: DVec2 = poly.iter().copied().sum::<DVec2>() / n;

    let (mut cxx, mut cyy, mut cxy) = (0.0, 0.0, 0.0);
    for &v in poly {
        let d = v - mean;
        cxx += d.x * d.x;
        cyy += d.y * d.y;
        cxy += d.x * d.y;
    }
    let angle = 0.5 * (2.0 * cxy).atan2(cxx - cyy);
    let mut axis = DVec2::new(angle.cos(), angle.sin());
    let perp = DVec2::new(-axis.y, axis.x);

    let (mut min_a, mut max_a) = (f64::MAX, f64::MIN);
    let (mut min_p, mut max_p) = (f64::MAX, f64::MIN);
    for &v in poly {
        let d = v - mean;
        let pa = d.dot(axis);
        let pp = d.dot(perp);
        min_a = min_a.min(pa);
        max_a = max_a.max(pa);
        min_p = min_p.min(pp);
        max_p = max_p.max(pp);
    }

    let center = mean + axis * ((max_a + min_a) * 0.5) + perp * ((max_p + min_p) * 0.5);
    let mut half = DVec2::new((max_a - min_a) * 0.5, (max_p - min_p) * 0.5);
    // Keep the major extent on the axis component.
    if half.y > half.x {
        half = DVec2::new(half.y, half.x);
        axis = perp;
    }
    Obb {
        center,
        axis,
        half_extents: half,
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
    fn test_area_and_perimeter() {
        let sq = square(10.0);
        assert!((polygon_area(&sq) - 100.0).abs() < 1e-9);
        assert!((polygon_perimeter(&sq) - 40.0).abs() < 1e-9);
        assert!(polygon_is_ccw(&sq));
    }

    #[test]
    fn test_area_is_unsigned() {
        let mut sq = square(10.0);
        sq.reverse();
        assert!((polygon_area(&sq) - 100.0).abs() < 1e-9);
        assert!(!polygon_is_ccw(&sq));
        ensure_ccw(&mut sq);
        assert!(polygon_is_ccw(&sq));
    }

    #[test]
    fn test_centroid_of_square() {
        let c = centroid(&square(10.0));
        assert!(c.distance(DVec2::new(5.0, 5.0)) < 1e-9);
    }

    #[test]
    fn test_point_in_polygon() {
        let sq = square(10.0);
        assert!(point_in_polygon(DVec2::new(5.0, 5.0), &sq));
        assert!(!point_in_polygon(DVec2::new(15.0, 5.0), &sq));
        assert!(!point_in_polygon(DVec2::new(-0.1, 5.0), &sq));
    }

    #[test]
    fn test_segment_intersect_crossing() {
        let x = segment_intersect(
            DVec2::new(0.0, 0.0),
            DVec2::new(10.0, 0.0),
            DVec2::new(5.0, -5.0),
            DVec2::new(5.0, 5.0),
            1e-3,
            1e-4,
        )
        .unwrap();
        assert!(x.distance(DVec2::new(5.0, 0.0)) < 1e-9);
    }

    #[test]
    fn test_segment_intersect_parallel_and_disjoint() {
        assert!(segment_intersect(
            DVec2::new(0.0, 0.0),
            DVec2::new(10.0, 0.0),
            DVec2::new(0.0, 1.0),
            DVec2::new(10.0, 1.0),
            1e-3,
            1e-4,
        )
        .is_none());
        assert!(segment_intersect(
            DVec2::new(0.0, 0.0),
            DVec2::new(10.0, 0.0),
            DVec2::new(20.0, -5.0),
            DVec2::new(20.0, 5.0),
            1e-3,
            1e-4,
        )
        .is_none());
    }

    #[test]
    fn test_offset_inward_shrinks_square() {
        let inner = offset_polygon_inward(&square(10.0), 2.0);
        assert_eq!(inner.len(), 4);
        assert!((polygon_area(&inner) - 36.0).abs() < 1e-6);
        assert!(point_in_polygon(DVec2::new(5.0, 5.0), &inner));
    }

    #[test]
    fn test_offset_inward_cw_input() {
        let mut sq = square(10.0);
        sq.reverse();
        let inner = offset_polygon_inward(&sq, 2.0);
        assert!((polygon_area(&inner) - 36.0).abs() < 1e-6);
    }

    #[test]
    fn test_offset_collapse_detectable() {
        let inner = offset_polygon_inward(&square(10.0), 6.0);
        // Over-offset inverts the ring; callers gate on area or vertex count.
        assert!(polygon_area(&inner) < 100.0);
    }

    #[test]
    fn test_clip_by_half_plane() {
        let sq = square(10.0);
        // Keep x >= 4.
        let clipped = clip_by_half_plane(&sq, DVec2::new(4.0, 0.0), DVec2::new(1.0, 0.0));
        assert!((polygon_area(&clipped) - 60.0).abs() < 1e-9);
        // Plane entirely outside keeps everything.
        let all = clip_by_half_plane(&sq, DVec2::new(-5.0, 0.0), DVec2::new(1.0, 0.0));
        assert!((polygon_area(&all) - 100.0).abs() < 1e-9);
        // Plane past the far side drops everything.
        let none = clip_by_half_plane(&sq, DVec2::new(15.0, 0.0), DVec2::new(1.0, 0.0));
        assert!(none.len() < 3);
    }

    #[test]
    fn test_polygon_intersects() {
        let a = square(10.0);
        let b: Vec<DVec2> = square(10.0)
            .into_iter()
            .map(|v| v + DVec2::new(5.0, 5.0))
            .collect();
        let c: Vec<DVec2> = square(10.0)
            .into_iter()
            .map(|v| v + DVec2::new(50.0, 50.0))
            .collect();
        assert!(polygon_intersects(&a, &b, 1e-3, 1e-4));
        assert!(!polygon_intersects(&a, &c, 1e-3, 1e-4));
        // Full containment.
        let tiny: Vec<DVec2> = square(2.0)
            .into_iter()
            .map(|v| v + DVec2::new(4.0, 4.0))
            .collect();
        assert!(polygon_intersects(&a, &tiny, 1e-3, 1e-4));
    }

    #[test]
    fn test_obb_of_rotated_rect() {
        // 20x4 rectangle rotated 30 degrees.
        let ang: f64 = 30f64.to_radians();
        let rot = |v: DVec2| {
            DVec2::new(
                v.x * ang.cos() - v.y * ang.sin(),
                v.x * ang.sin() + v.y * ang.cos(),
            )
        };
        let rect: Vec<DVec2> = [
            DVec2::new(-10.0, -2.0),
            DVec2::new(10.0, -2.0),
            DVec2::new(10.0, 2.0),
            DVec2::new(-10.0, 2.0),
        ]
        .into_iter()
        .map(rot)
        .collect();
        let obb = oriented_bounding_box(&rect);
        assert!((obb.half_extents.x - 10.0).abs() < 0.5);
        assert!((obb.half_extents.y - 2.0).abs() < 0.5);
        let axis_angle = obb.axis.y.atan2(obb.axis.x).abs();
        assert!((axis_angle - ang).abs() < 0.05 || (axis_angle - (std::f64::consts::PI - ang)).abs() < 0.05);
    }

    #[test]
    fn test_dist_point_to_segment() {
        let d = dist_point_to_segment(
            DVec2::new(5.0, 3.0),
            DVec2::new(0.0, 0.0),
            DVec2::new(10.0, 0.0),
        );
        assert!((d - 3.0).abs() < 1e-9);
        // Beyond the endpoint the distance is to the endpoint.
        let d2 = dist_point_to_segment(
            DVec2::new(14.0, 3.0),
            DVec2::new(0.0, 0.0),
            DVec2::new(10.0, 0.0),
        );
        assert!((d2 - 5.0).abs() < 1e-9);
    }
}
