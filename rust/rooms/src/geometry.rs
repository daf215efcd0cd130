// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared 2D primitives: directions, distances, intersections, rings

use crate::types::Point2D;
use nalgebra::Vector2;

/// Tolerance for parallel/degenerate tests on unit vectors
pub const EPSILON: f64 = 1e-9;

/// Unit vector from `from` to `to`, `None` when the points coincide
pub fn direction(from: &Point2D, to: &Point2D) -> Option<Vector2<f64>> {
    let v = to.to_vector() - from.to_vector();
    let len = v.norm();
    if len < EPSILON {
        None
    } else {
        Some(v / len)
    }
}

/// Left-hand normal of a unit direction
pub fn left_normal(d: &Vector2<f64>) -> Vector2<f64> {
    Vector2::new(-d.y, d.x)
}

/// Distance from a point to a line segment (clamped projection)
pub fn point_to_segment_distance(point: &Point2D, start: &Point2D, end: &Point2D) -> f64 {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_sq = dx * dx + dy * dy;

    if length_sq < 1e-10 {
        return point.distance_to(start);
    }

    let t = ((point.x - start.x) * dx + (point.y - start.y) * dy) / length_sq;
    let t = t.clamp(0.0, 1.0);

    let proj = Point2D::new(start.x + t * dx, start.y + t * dy);
    point.distance_to(&proj)
}

/// Distance from a point to the infinite line through `start` and `end`
pub fn perpendicular_distance(point: &Point2D, start: &Point2D, end: &Point2D) -> f64 {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_sq = dx * dx + dy * dy;

    if length_sq < 1e-10 {
        return point.distance_to(start);
    }

    let length = length_sq.sqrt();
    ((point.x - start.x) * dy - (point.y - start.y) * dx).abs() / length
}

/// Parameter of the projection of `point` onto `start + t * (end - start)`
pub fn project_parameter(point: &Point2D, start: &Point2D, end: &Point2D) -> f64 {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_sq = dx * dx + dy * dy;
    if length_sq < 1e-10 {
        return 0.0;
    }
    ((point.x - start.x) * dx + (point.y - start.y) * dy) / length_sq
}

pub fn lerp(start: &Point2D, end: &Point2D, t: f64) -> Point2D {
    Point2D::new(
        start.x + t * (end.x - start.x),
        start.y + t * (end.y - start.y),
    )
}

/// Intersection of the infinite lines `p + t * d` and `q + s * e`.
///
/// Returns the point with both line parameters, or `None` for parallel lines.
pub fn line_intersection(
    p: &Point2D,
    d: &Vector2<f64>,
    q: &Point2D,
    e: &Vector2<f64>,
) -> Option<(Point2D, f64, f64)> {
    let denom = d.perp(e);
    if denom.abs() < EPSILON {
        return None;
    }
    let w = q.to_vector() - p.to_vector();
    let t = w.perp(e) / denom;
    let s = w.perp(d) / denom;
    Some((p.offset(d, t), t, s))
}

/// Intersection of two segments, including touching endpoints.
///
/// Parameters are returned along both segments. Collinear overlaps return
/// `None`; callers handle them through projection.
pub fn segment_intersection(
    a1: &Point2D,
    a2: &Point2D,
    b1: &Point2D,
    b2: &Point2D,
    tolerance: f64,
) -> Option<(Point2D, f64, f64)> {
    let r = a2.to_vector() - a1.to_vector();
    let s = b2.to_vector() - b1.to_vector();
    let denom = r.perp(&s);
    let r_len = r.norm();
    let s_len = s.norm();
    if r_len < EPSILON || s_len < EPSILON {
        return None;
    }
    // Normalised cross product below this means parallel.
    if (denom / (r_len * s_len)).abs() < 1e-9 {
        return None;
    }
    let w = b1.to_vector() - a1.to_vector();
    let t = w.perp(&s) / denom;
    let u = w.perp(&r) / denom;
    let t_tol = tolerance / r_len;
    let u_tol = tolerance / s_len;
    if t < -t_tol || t > 1.0 + t_tol || u < -u_tol || u > 1.0 + u_tol {
        return None;
    }
    let t = t.clamp(0.0, 1.0);
    let u = u.clamp(0.0, 1.0);
    Some((lerp(a1, a2, t), t, u))
}

/// Signed area (positive for counter-clockwise rings)
pub fn signed_area(ring: &[Point2D]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += ring[i].x * ring[j].y;
        area -= ring[j].x * ring[i].y;
    }
    area / 2.0
}

/// Arithmetic mean of the points
pub fn mean_point(points: &[Point2D]) -> Point2D {
    if points.is_empty() {
        return Point2D::new(0.0, 0.0);
    }
    let n = points.len() as f64;
    Point2D::new(
        points.iter().map(|p| p.x).sum::<f64>() / n,
        points.iter().map(|p| p.y).sum::<f64>() / n,
    )
}

/// Ray casting point-in-ring test. Boundary points may go either way.
pub fn point_in_ring(point: &Point2D, ring: &[Point2D]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let vi = ring[i];
        let vj = ring[j];
        if ((vi.y > point.y) != (vj.y > point.y))
            && (point.x < (vj.x - vi.x) * (point.y - vi.y) / (vj.y - vi.y) + vi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Distance from a point to the closest edge of a closed ring
pub fn distance_to_ring(point: &Point2D, ring: &[Point2D]) -> f64 {
    let n = ring.len();
    (0..n)
        .map(|i| point_to_segment_distance(point, &ring[i], &ring[(i + 1) % n]))
        .fold(f64::INFINITY, f64::min)
}

fn cross(o: &Point2D, a: &Point2D, b: &Point2D) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Convex hull by Andrew's monotone chain, counter-clockwise
pub fn convex_hull(points: &[Point2D]) -> Vec<Point2D> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));

    let mut lower: Vec<Point2D> = Vec::new();
    for p in &sorted {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0
        {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Point2D> = Vec::new();
    for p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0
        {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Minimum width of the point set over all directions (rotating calipers).
///
/// For each hull edge the extent perpendicular to it is measured; the smallest
/// such extent is the width of the thinnest enclosing strip.
pub fn min_bounding_width(points: &[Point2D]) -> f64 {
    let hull = convex_hull(points);
    let n = hull.len();
    if n < 3 {
        return 0.0;
    }
    let mut best = f64::INFINITY;
    for i in 0..n {
        let a = hull[i];
        let b = hull[(i + 1) % n];
        if a.distance_to(&b) < EPSILON {
            continue;
        }
        let extent = hull
            .iter()
            .map(|p| perpendicular_distance(p, &a, &b))
            .fold(0.0, f64::max);
        best = best.min(extent);
    }
    if best.is_finite() {
        best
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_point_to_segment_distance() {
        let start = Point2D::new(0.0, 0.0);
        let end = Point2D::new(10.0, 0.0);
        assert_relative_eq!(point_to_segment_distance(&Point2D::new(5.0, 5.0), &start, &end), 5.0);
        assert_relative_eq!(point_to_segment_distance(&Point2D::new(13.0, 4.0), &start, &end), 5.0);
    }

    #[test]
    fn test_line_intersection_perpendicular() {
        let p = Point2D::new(0.0, 0.0);
        let d = Vector2::new(1.0, 0.0);
        let q = Point2D::new(5.0, 5.0);
        let e = Vector2::new(0.0, -1.0);
        let (x, t, s) = line_intersection(&p, &d, &q, &e).unwrap();
        assert_relative_eq!(x.x, 5.0);
        assert_relative_eq!(x.y, 0.0);
        assert_relative_eq!(t, 5.0);
        assert_relative_eq!(s, 5.0);
        assert!(line_intersection(&p, &d, &q, &d).is_none());
    }

    #[test]
    fn test_segment_intersection_touching() {
        let hit = segment_intersection(
            &Point2D::new(0.0, 0.0),
            &Point2D::new(10.0, 0.0),
            &Point2D::new(5.0, 0.0),
            &Point2D::new(5.0, 10.0),
            1e-6,
        )
        .unwrap();
        assert_relative_eq!(hit.0.x, 5.0);
        assert_relative_eq!(hit.1, 0.5);
        assert_relative_eq!(hit.2, 0.0);
    }

    #[test]
    fn test_signed_area_orientation() {
        let ccw = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(10.0, 0.0),
            Point2D::new(10.0, 10.0),
            Point2D::new(0.0, 10.0),
        ];
        assert_relative_eq!(signed_area(&ccw), 100.0);
        let cw: Vec<Point2D> = ccw.iter().rev().copied().collect();
        assert_relative_eq!(signed_area(&cw), -100.0);
    }

    #[test]
    fn test_point_in_ring() {
        let ring = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(10.0, 0.0),
            Point2D::new(10.0, 10.0),
            Point2D::new(0.0, 10.0),
        ];
        assert!(point_in_ring(&Point2D::new(5.0, 5.0), &ring));
        assert!(!point_in_ring(&Point2D::new(15.0, 5.0), &ring));
    }

    #[test]
    fn test_min_bounding_width_rotated_strip() {
        // 100 x 4 strip rotated by 45 degrees
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let ring = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(100.0 * h, 100.0 * h),
            Point2D::new(100.0 * h - 4.0 * h, 100.0 * h + 4.0 * h),
            Point2D::new(-4.0 * h, 4.0 * h),
        ];
        assert_relative_eq!(min_bounding_width(&ring), 4.0, epsilon = 1e-9);
    }
}
