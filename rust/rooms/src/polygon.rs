// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Validated room boundary ring

use crate::error::{Error, Result};
use crate::geometry::{
    self, direction, distance_to_ring, left_normal, line_intersection, point_in_ring,
    segment_intersection,
};
use crate::types::{Point2D, IDENTICAL_POINT_DISTANCE};
use serde::{Deserialize, Serialize};

/// Rings with less area than this are degenerate
const MIN_RING_AREA: f64 = 1e-6;

/// Miter points further than this many offset distances from their vertex
/// are replaced by a bevel.
const MITER_LIMIT: f64 = 4.0;

/// Closed, simple ring of at least three distinct points.
///
/// The closing point is not stored. Construction goes through
/// [`RoomPolygon::new`], which rejects degenerate input, so every value of this
/// type satisfies the ring invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point2D>", into = "Vec<Point2D>")]
pub struct RoomPolygon {
    points: Vec<Point2D>,
}

impl RoomPolygon {
    /// Build a ring, dropping an explicit closing point and consecutive
    /// duplicates. Fails for fewer than three distinct points, a vertex visited
    /// twice, collinear-only input, or non-finite coordinates.
    pub fn new(points: Vec<Point2D>) -> Result<Self> {
        if points.iter().any(|p| !p.is_finite()) {
            return Err(Error::Numerical("ring has non-finite coordinates".into()));
        }

        let mut cleaned: Vec<Point2D> = Vec::with_capacity(points.len());
        for p in points {
            match cleaned.last() {
                Some(last) if last.distance_to(&p) < IDENTICAL_POINT_DISTANCE => {}
                _ => cleaned.push(p),
            }
        }
        while cleaned.len() > 1
            && cleaned[0].distance_to(&cleaned[cleaned.len() - 1]) < IDENTICAL_POINT_DISTANCE
        {
            cleaned.pop();
        }

        if cleaned.len() < 3 {
            return Err(Error::DegenerateRing(format!(
                "{} distinct points",
                cleaned.len()
            )));
        }
        if let Some((i, j)) = repeated_vertex(&cleaned) {
            return Err(Error::DegenerateRing(format!(
                "vertex {} repeats vertex {}",
                j, i
            )));
        }
        if geometry::signed_area(&cleaned).abs() < MIN_RING_AREA {
            return Err(Error::DegenerateRing("zero area".into()));
        }

        Ok(Self { points: cleaned })
    }

    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points with the first point repeated at the end
    pub fn closed_points(&self) -> Vec<Point2D> {
        let mut pts = self.points.clone();
        pts.push(self.points[0]);
        pts
    }

    pub fn signed_area(&self) -> f64 {
        geometry::signed_area(&self.points)
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    pub fn is_ccw(&self) -> bool {
        self.signed_area() > 0.0
    }

    pub fn perimeter(&self) -> f64 {
        let n = self.points.len();
        (0..n)
            .map(|i| self.points[i].distance_to(&self.points[(i + 1) % n]))
            .sum()
    }

    /// Arithmetic mean of the vertices
    pub fn vertex_centroid(&self) -> Point2D {
        geometry::mean_point(&self.points)
    }

    /// Area-weighted centroid
    pub fn area_centroid(&self) -> Point2D {
        let n = self.points.len();
        let mut a = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..n {
            let p = self.points[i];
            let q = self.points[(i + 1) % n];
            let cross = p.x * q.y - q.x * p.y;
            a += cross;
            cx += (p.x + q.x) * cross;
            cy += (p.y + q.y) * cross;
        }
        if a.abs() < 1e-12 {
            return self.vertex_centroid();
        }
        Point2D::new(cx / (3.0 * a), cy / (3.0 * a))
    }

    /// Counter-clockwise copy starting at the lexicographically smallest vertex
    pub fn normalized(&self) -> RoomPolygon {
        let mut pts = self.points.clone();
        if !self.is_ccw() {
            pts.reverse();
        }
        let start = pts
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)))
            .map(|(i, _)| i)
            .unwrap_or(0);
        pts.rotate_left(start);
        RoomPolygon { points: pts }
    }

    pub fn bounding_box(&self) -> (Point2D, Point2D) {
        let mut min = Point2D::new(f64::MAX, f64::MAX);
        let mut max = Point2D::new(f64::MIN, f64::MIN);
        for p in &self.points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        (min, max)
    }

    /// Width of the thinnest strip containing the ring
    pub fn min_width(&self) -> f64 {
        geometry::min_bounding_width(&self.points)
    }

    /// Point strictly inside, or on the boundary within `tolerance`
    pub fn covers_point(&self, point: &Point2D, tolerance: f64) -> bool {
        point_in_ring(point, &self.points) || distance_to_ring(point, &self.points) <= tolerance
    }

    /// True when `other` lies inside this ring (boundary contact allowed) and
    /// this ring is strictly larger.
    pub fn contains(&self, other: &RoomPolygon, tolerance: f64) -> bool {
        if self.area() <= other.area() + tolerance * tolerance {
            return false;
        }
        let (min_a, max_a) = self.bounding_box();
        let (min_b, max_b) = other.bounding_box();
        if min_b.x < min_a.x - tolerance
            || min_b.y < min_a.y - tolerance
            || max_b.x > max_a.x + tolerance
            || max_b.y > max_a.y + tolerance
        {
            return false;
        }

        let n = other.points.len();
        let vertices_inside = other
            .points
            .iter()
            .all(|p| self.covers_point(p, tolerance));
        // Edge midpoints catch neighbours that only share boundary vertices.
        let midpoints_inside = (0..n).all(|i| {
            let mid = other.points[i].midpoint(&other.points[(i + 1) % n]);
            self.covers_point(&mid, tolerance)
        });
        vertices_inside && midpoints_inside && point_in_ring(&other.interior_probe(), &self.points)
    }

    /// A point inside the ring: the vertex centroid when it is inside,
    /// otherwise the midpoint of the widest horizontal span through it.
    pub fn interior_probe(&self) -> Point2D {
        let c = self.vertex_centroid();
        if point_in_ring(&c, &self.points) {
            return c;
        }
        let n = self.points.len();
        let mut xs: Vec<f64> = Vec::new();
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            if (a.y > c.y) != (b.y > c.y) {
                xs.push(a.x + (c.y - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
        xs.sort_by(f64::total_cmp);
        xs.chunks(2)
            .filter(|pair| pair.len() == 2)
            .max_by(|a, b| (a[1] - a[0]).total_cmp(&(b[1] - b[0])))
            .map(|pair| Point2D::new((pair[0] + pair[1]) / 2.0, c.y))
            .unwrap_or(c)
    }

    /// True when two non-adjacent edges cross
    pub fn is_self_intersecting(&self) -> bool {
        let n = self.points.len();
        for i in 0..n {
            let a1 = self.points[i];
            let a2 = self.points[(i + 1) % n];
            for j in (i + 2)..n {
                if i == 0 && j == n - 1 {
                    continue;
                }
                let b1 = self.points[j];
                let b2 = self.points[(j + 1) % n];
                if segment_intersection(&a1, &a2, &b1, &b2, -1e-9).is_some() {
                    return true;
                }
            }
        }
        false
    }

    /// Shrink the ring inward by `distance` with mitered corners.
    ///
    /// `Ok(None)` means the ring collapses at this distance. `Err` signals a
    /// numerical failure; callers keep the original ring in that case.
    pub fn inset(&self, distance: f64) -> Result<Option<RoomPolygon>> {
        if distance <= 0.0 {
            return Ok(Some(self.clone()));
        }
        if !distance.is_finite() {
            return Err(Error::Numerical(format!("inset distance {}", distance)));
        }

        let ring = self.normalized();
        let pts = ring.points();
        let n = pts.len();
        let mut result: Vec<Point2D> = Vec::with_capacity(n);

        for i in 0..n {
            let prev = pts[(i + n - 1) % n];
            let curr = pts[i];
            let next = pts[(i + 1) % n];
            let (d1, d2) = match (direction(&prev, &curr), direction(&curr, &next)) {
                (Some(d1), Some(d2)) => (d1, d2),
                _ => return Err(Error::Numerical("zero-length ring edge".into())),
            };
            // Counter-clockwise ring: the interior is on the left.
            let n1 = left_normal(&d1);
            let n2 = left_normal(&d2);
            let p1 = curr.offset(&n1, distance);
            let p2 = curr.offset(&n2, distance);

            match line_intersection(&p1, &d1, &p2, &d2) {
                Some((corner, _, _)) if corner.distance_to(&curr) <= distance * MITER_LIMIT => {
                    result.push(corner)
                }
                Some(_) => {
                    result.push(p1);
                    result.push(p2);
                }
                // Collinear edges
                None => result.push(p1),
            }
        }

        if result.iter().any(|p| !p.is_finite()) {
            return Err(Error::Numerical("inset produced non-finite vertices".into()));
        }

        let inset = match RoomPolygon::new(result) {
            Ok(ring) => ring,
            Err(Error::DegenerateRing(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        // A flipped or grown ring means the offset passed through itself.
        if !inset.is_ccw() || inset.area() >= ring.area() || inset.is_self_intersecting() {
            return Ok(None);
        }
        Ok(Some(inset))
    }
}

impl TryFrom<Vec<Point2D>> for RoomPolygon {
    type Error = Error;

    fn try_from(points: Vec<Point2D>) -> Result<Self> {
        RoomPolygon::new(points)
    }
}

impl From<RoomPolygon> for Vec<Point2D> {
    fn from(polygon: RoomPolygon) -> Self {
        polygon.points
    }
}

/// First pair of vertices that coincide, consecutive duplicates already removed
fn repeated_vertex(points: &[Point2D]) -> Option<(usize, usize)> {
    (0..points.len()).find_map(|i| {
        (i + 1..points.len())
            .find(|&j| points[i].distance_to(&points[j]) < IDENTICAL_POINT_DISTANCE)
            .map(|j| (i, j))
    })
}
