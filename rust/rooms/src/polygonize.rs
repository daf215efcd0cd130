// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon assembly from a line network.
//!
//! Extracts every bounded face of the planar graph the segments induce:
//! 1. Node the segments at all crossings, T-contacts and collinear overlaps
//! 2. Snap coincident vertices and deduplicate edges
//! 3. Prune dangles (degree-1 filaments) and cut edges (bridges)
//! 4. Walk faces through a half-edge structure and keep the bounded ones
//!
//! Rings come out counter-clockwise, starting at their lexicographically
//! smallest vertex, sorted, so the result does not depend on input order.

use crate::geometry::{perpendicular_distance, project_parameter, segment_intersection, signed_area};
use crate::polygon::RoomPolygon;
use crate::types::{Point2D, Segment};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Points closer than this are one graph vertex.
pub const SNAP_TOLERANCE: f64 = 1e-3;

/// Faces with less area than this are noise from near-coincident edges.
const MIN_FACE_AREA: f64 = 1e-6;

/// Result of polygon assembly
#[derive(Debug, Clone)]
pub struct PolygonizeOutcome {
    pub rings: Vec<RoomPolygon>,
    pub stats: PolygonizeStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonizeStats {
    pub input_segments: usize,
    pub vertices: usize,
    pub edges: usize,
    /// Edges removed because they led to a dead end
    pub dangles: usize,
    /// Edges removed because both sides belong to the same face
    pub cut_edges: usize,
    /// Faces whose boundary passed a vertex twice and was split into loops
    pub split_faces: usize,
    /// Bounded faces that did not form a valid ring
    pub rejected_faces: usize,
    pub rings: usize,
}

/// Extract all bounded rings supported by `segments`
pub fn polygonize(segments: &[Segment]) -> PolygonizeOutcome {
    let mut stats = PolygonizeStats {
        input_segments: segments.len(),
        ..Default::default()
    };

    let pieces: Vec<(Point2D, Point2D)> = segments
        .iter()
        .filter(|s| s.is_valid())
        .flat_map(|s| s.points.windows(2).map(|w| (w[0], w[1])))
        .filter(|(a, b)| a.distance_to(b) > SNAP_TOLERANCE)
        .collect();

    let mut graph = PlanarGraph::from_pieces(&pieces);
    stats.vertices = graph.vertices.len();
    stats.edges = graph.edges.len();

    let faces = loop {
        stats.dangles += graph.prune_dangles();
        let next = graph.link_half_edges();
        let (face_of, faces) = graph.label_faces(&next);

        let cuts: Vec<usize> = (0..graph.edges.len())
            .filter(|&e| graph.alive[e] && face_of[2 * e] == face_of[2 * e + 1])
            .collect();
        if cuts.is_empty() {
            break faces;
        }
        stats.cut_edges += cuts.len();
        for e in cuts {
            graph.alive[e] = false;
        }
    };

    let mut rings = Vec::new();
    for face in faces {
        let walk: Vec<usize> = face.iter().map(|&h| graph.origin(h)).collect();
        let loops = split_at_repeats(&walk);
        if loops.len() > 1 {
            stats.split_faces += 1;
        }
        for ids in loops {
            let mut points: Vec<Point2D> = ids.iter().map(|&v| graph.vertices[v]).collect();
            // Bounded faces are traversed clockwise; the unbounded one of each
            // component, and islands touching a boundary, come out
            // counter-clockwise.
            if signed_area(&points) > -MIN_FACE_AREA {
                continue;
            }
            points.reverse();
            match RoomPolygon::new(drop_collinear_vertices(points)) {
                Ok(ring) => rings.push(ring.normalized()),
                Err(e) => {
                    stats.rejected_faces += 1;
                    tracing::debug!(error = %e, "Rejected face");
                }
            }
        }
    }

    rings.sort_by(|a, b| {
        let (pa, pb) = (a.points()[0], b.points()[0]);
        pa.x.total_cmp(&pb.x)
            .then(pa.y.total_cmp(&pb.y))
            .then(a.area().total_cmp(&b.area()))
    });
    stats.rings = rings.len();

    tracing::debug!(
        segments = stats.input_segments,
        vertices = stats.vertices,
        edges = stats.edges,
        dangles = stats.dangles,
        cut_edges = stats.cut_edges,
        rings = stats.rings,
        "Polygonized segments"
    );

    PolygonizeOutcome { rings, stats }
}

/// Planar graph with undirected edges stored once.
///
/// Edge `e` owns half-edges `2e` (first to second vertex) and `2e + 1`
/// (reverse), so the twin of half-edge `h` is `h ^ 1`.
#[derive(Debug, Default)]
struct PlanarGraph {
    vertices: Vec<Point2D>,
    edges: Vec<(usize, usize)>,
    alive: Vec<bool>,
}

impl PlanarGraph {
    fn from_pieces(pieces: &[(Point2D, Point2D)]) -> Self {
        let cuts = node_pieces(pieces);

        let mut graph = PlanarGraph::default();
        let mut snap = VertexSnap::new(SNAP_TOLERANCE);
        let mut seen: FxHashMap<(usize, usize), usize> = FxHashMap::default();

        for (&(a, b), params) in pieces.iter().zip(cuts) {
            let ids: Vec<usize> = params
                .iter()
                .map(|&t| {
                    let p = crate::geometry::lerp(&a, &b, t);
                    snap.vertex(p, &mut graph.vertices)
                })
                .collect();
            for w in ids.windows(2) {
                let (u, v) = (w[0], w[1]);
                if u == v {
                    continue;
                }
                let key = (u.min(v), u.max(v));
                if seen.contains_key(&key) {
                    continue;
                }
                seen.insert(key, graph.edges.len());
                graph.edges.push((u, v));
                graph.alive.push(true);
            }
        }
        graph
    }

    fn origin(&self, h: usize) -> usize {
        let (u, v) = self.edges[h / 2];
        if h % 2 == 0 {
            u
        } else {
            v
        }
    }

    fn destination(&self, h: usize) -> usize {
        self.origin(h ^ 1)
    }

    fn degrees(&self) -> Vec<usize> {
        let mut degree = vec![0; self.vertices.len()];
        for (e, &(u, v)) in self.edges.iter().enumerate() {
            if self.alive[e] {
                degree[u] += 1;
                degree[v] += 1;
            }
        }
        degree
    }

    /// Iteratively remove edges ending at a degree-1 vertex
    fn prune_dangles(&mut self) -> usize {
        let mut removed = 0;
        loop {
            let degree = self.degrees();
            let dangling: Vec<usize> = (0..self.edges.len())
                .filter(|&e| {
                    let (u, v) = self.edges[e];
                    self.alive[e] && (degree[u] == 1 || degree[v] == 1)
                })
                .collect();
            if dangling.is_empty() {
                return removed;
            }
            removed += dangling.len();
            for e in dangling {
                self.alive[e] = false;
            }
        }
    }

    /// Next half-edge of each live half-edge when walking its face.
    ///
    /// Outgoing half-edges are sorted by angle around their origin; arriving
    /// through the twin of outgoing edge `i`, the walk leaves through edge
    /// `i + 1`, which keeps the face on its right.
    fn link_half_edges(&self) -> Vec<Option<usize>> {
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); self.vertices.len()];
        for e in 0..self.edges.len() {
            if self.alive[e] {
                outgoing[self.origin(2 * e)].push(2 * e);
                outgoing[self.origin(2 * e + 1)].push(2 * e + 1);
            }
        }

        let mut next = vec![None; self.edges.len() * 2];
        for (v, out) in outgoing.iter_mut().enumerate() {
            if out.is_empty() {
                continue;
            }
            let origin = self.vertices[v];
            let angle = |h: usize| {
                let d = self.vertices[self.destination(h)];
                (d.y - origin.y).atan2(d.x - origin.x)
            };
            out.sort_by(|&a, &b| angle(a).total_cmp(&angle(b)).then(a.cmp(&b)));
            for i in 0..out.len() {
                let arriving = out[i] ^ 1;
                next[arriving] = Some(out[(i + 1) % out.len()]);
            }
        }
        next
    }

    /// Assign every live half-edge to a face; returns the face id per
    /// half-edge and each face's half-edges in walk order.
    fn label_faces(&self, next: &[Option<usize>]) -> (Vec<usize>, Vec<Vec<usize>>) {
        let mut face_of = vec![usize::MAX; next.len()];
        let mut faces: Vec<Vec<usize>> = Vec::new();

        for start in 0..next.len() {
            if !self.alive[start / 2] || face_of[start] != usize::MAX {
                continue;
            }
            let id = faces.len();
            let mut face = Vec::new();
            let mut current = start;
            for _ in 0..next.len() {
                if face_of[current] != usize::MAX {
                    break;
                }
                face_of[current] = id;
                face.push(current);
                match next[current] {
                    Some(h) if h != start => current = h,
                    _ => break,
                }
            }
            faces.push(face);
        }
        (face_of, faces)
    }
}

/// Split parameters in [0, 1] for every piece, sorted and deduplicated
fn node_pieces(pieces: &[(Point2D, Point2D)]) -> Vec<Vec<f64>> {
    let mut cuts: Vec<Vec<f64>> = vec![vec![0.0, 1.0]; pieces.len()];

    for i in 0..pieces.len() {
        let (a1, a2) = pieces[i];
        for j in (i + 1)..pieces.len() {
            let (b1, b2) = pieces[j];
            if !boxes_touch(&a1, &a2, &b1, &b2, SNAP_TOLERANCE) {
                continue;
            }
            if let Some((_, t, u)) = segment_intersection(&a1, &a2, &b1, &b2, SNAP_TOLERANCE) {
                cuts[i].push(t);
                cuts[j].push(u);
                continue;
            }
            // Collinear overlap: each piece is cut where the other one ends.
            for (p, target, (s1, s2)) in [(b1, i, (a1, a2)), (b2, i, (a1, a2)), (a1, j, (b1, b2)), (a2, j, (b1, b2))] {
                if perpendicular_distance(&p, &s1, &s2) > SNAP_TOLERANCE {
                    continue;
                }
                let t = project_parameter(&p, &s1, &s2);
                if t > 0.0 && t < 1.0 {
                    cuts[target].push(t);
                }
            }
        }
    }

    for (params, &(a, b)) in cuts.iter_mut().zip(pieces) {
        let len = a.distance_to(&b);
        params.sort_by(f64::total_cmp);
        params.dedup_by(|x, y| (*x - *y).abs() * len < SNAP_TOLERANCE);
    }
    cuts
}

fn boxes_touch(a1: &Point2D, a2: &Point2D, b1: &Point2D, b2: &Point2D, tolerance: f64) -> bool {
    a1.x.min(a2.x) - tolerance <= b1.x.max(b2.x)
        && b1.x.min(b2.x) - tolerance <= a1.x.max(a2.x)
        && a1.y.min(a2.y) - tolerance <= b1.y.max(b2.y)
        && b1.y.min(b2.y) - tolerance <= a1.y.max(a2.y)
}

/// Grid lookup that merges points within the snap tolerance
struct VertexSnap {
    tolerance: f64,
    cells: FxHashMap<(i64, i64), Vec<usize>>,
}

impl VertexSnap {
    fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            cells: FxHashMap::default(),
        }
    }

    fn key(&self, p: &Point2D) -> (i64, i64) {
        (
            (p.x / self.tolerance).floor() as i64,
            (p.y / self.tolerance).floor() as i64,
        )
    }

    fn vertex(&mut self, p: Point2D, vertices: &mut Vec<Point2D>) -> usize {
        let (cx, cy) = self.key(&p);
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(ids) = self.cells.get(&(cx + dx, cy + dy)) {
                    if let Some(&id) = ids
                        .iter()
                        .find(|&&id| vertices[id].distance_to(&p) < self.tolerance)
                    {
                        return id;
                    }
                }
            }
        }
        let id = vertices.len();
        vertices.push(p);
        self.cells.entry((cx, cy)).or_default().push(id);
        id
    }
}

/// Split a closed vertex walk into simple loops at every vertex it revisits.
///
/// `[a, b, c, d, b, e]` becomes `[b, c, d]` and `[a, b, e]`.
fn split_at_repeats(walk: &[usize]) -> Vec<Vec<usize>> {
    let mut loops = Vec::new();
    let mut open: Vec<usize> = Vec::with_capacity(walk.len());
    for &v in walk {
        match open.iter().position(|&u| u == v) {
            Some(pos) => {
                let mut closed = vec![v];
                closed.extend(open.split_off(pos + 1));
                loops.push(closed);
            }
            None => open.push(v),
        }
    }
    loops.push(open);
    loops
}

/// Remove vertices lying on the straight line between their neighbours
fn drop_collinear_vertices(mut points: Vec<Point2D>) -> Vec<Point2D> {
    loop {
        let n = points.len();
        if n <= 3 {
            return points;
        }
        let Some(i) = (0..n).find(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            perpendicular_distance(&points[i], &prev, &next) < SNAP_TOLERANCE
        }) else {
            return points;
        };
        points.remove(i);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> Segment {
        Segment::line(Point2D::new(x1, y1), Point2D::new(x2, y2))
    }

    fn has_point(ring: &RoomPolygon, x: f64, y: f64) -> bool {
        ring.points()
            .iter()
            .any(|p| p.distance_to(&Point2D::new(x, y)) < 1e-6)
    }

    #[test]
    fn test_l_shape_single_ring() {
        let segments = vec![
            line(0.0, 0.0, 100.0, 0.0),
            line(100.0, 0.0, 100.0, 50.0),
            line(100.0, 50.0, 50.0, 50.0),
            line(50.0, 50.0, 50.0, 25.0),
            line(50.0, 25.0, 0.0, 25.0),
            line(0.0, 25.0, 0.0, 0.0),
        ];
        let outcome = polygonize(&segments);
        assert_eq!(outcome.rings.len(), 1);
        let ring = &outcome.rings[0];
        assert_eq!(ring.len(), 6);
        for (x, y) in [(0.0, 0.0), (100.0, 0.0), (100.0, 50.0), (50.0, 50.0), (50.0, 25.0), (0.0, 25.0)] {
            assert!(has_point(ring, x, y));
        }
        assert!(ring.is_ccw());
        assert_relative_eq!(ring.area(), 100.0 * 25.0 + 50.0 * 25.0, epsilon = 1e-9);
    }

    #[test]
    fn test_shared_wall_gives_two_rings() {
        let segments = vec![
            line(0.0, 0.0, 200.0, 0.0),
            line(200.0, 0.0, 200.0, 100.0),
            line(200.0, 100.0, 0.0, 100.0),
            line(0.0, 100.0, 0.0, 0.0),
            line(100.0, 0.0, 100.0, 100.0),
        ];
        let outcome = polygonize(&segments);
        assert_eq!(outcome.rings.len(), 2);
        for ring in &outcome.rings {
            assert_eq!(ring.len(), 4);
            assert_relative_eq!(ring.area(), 10000.0, epsilon = 1e-9);
        }
        assert!(has_point(&outcome.rings[0], 0.0, 0.0));
        assert!(has_point(&outcome.rings[1], 200.0, 0.0));
    }

    #[test]
    fn test_crossing_centerlines_with_overshoot() {
        let segments = vec![
            line(0.0, 3.0, 106.0, 3.0),
            line(103.0, 0.0, 103.0, 106.0),
            line(106.0, 103.0, 0.0, 103.0),
            line(3.0, 106.0, 3.0, 0.0),
        ];
        let outcome = polygonize(&segments);
        assert_eq!(outcome.rings.len(), 1);
        assert_eq!(outcome.stats.dangles, 8);
        assert_relative_eq!(outcome.rings[0].area(), 10000.0, epsilon = 1e-6);
        assert!(has_point(&outcome.rings[0], 3.0, 3.0));
    }

    #[test]
    fn test_polyline_ring_and_stray_line() {
        let square = Segment::new(
            vec![
                Point2D::new(0.0, 0.0),
                Point2D::new(50.0, 0.0),
                Point2D::new(50.0, 50.0),
                Point2D::new(0.0, 50.0),
                Point2D::new(0.0, 0.0),
            ],
            1.0,
            true,
            false,
        );
        let stray = line(50.0, 25.0, 80.0, 25.0);
        let outcome = polygonize(&[square, stray]);
        assert_eq!(outcome.rings.len(), 1);
        assert_eq!(outcome.stats.dangles, 1);
        assert_eq!(outcome.rings[0].len(), 4);
    }

    #[test]
    fn test_bridge_between_rooms_is_cut() {
        let mut segments = Vec::new();
        for (x0, x1) in [(0.0, 10.0), (20.0, 30.0)] {
            segments.push(line(x0, 0.0, x1, 0.0));
            segments.push(line(x1, 0.0, x1, 10.0));
            segments.push(line(x1, 10.0, x0, 10.0));
            segments.push(line(x0, 10.0, x0, 0.0));
        }
        segments.push(line(10.0, 5.0, 20.0, 5.0));
        let outcome = polygonize(&segments);
        assert_eq!(outcome.rings.len(), 2);
        assert_eq!(outcome.stats.cut_edges, 1);
        assert!(outcome.rings.iter().all(|r| r.len() == 4));
    }

    #[test]
    fn test_open_network_yields_nothing() {
        let outcome = polygonize(&[line(0.0, 0.0, 10.0, 0.0), line(10.0, 0.0, 10.0, 10.0)]);
        assert!(outcome.rings.is_empty());
        assert_eq!(outcome.stats.dangles, 2);
    }

    #[test]
    fn test_collinear_overlap_is_noded() {
        // The bottom wall is drawn twice with overlapping extents
        let segments = vec![
            line(0.0, 0.0, 60.0, 0.0),
            line(40.0, 0.0, 100.0, 0.0),
            line(100.0, 0.0, 100.0, 50.0),
            line(100.0, 50.0, 0.0, 50.0),
            line(0.0, 50.0, 0.0, 0.0),
        ];
        let outcome = polygonize(&segments);
        assert_eq!(outcome.rings.len(), 1);
        assert_eq!(outcome.rings[0].len(), 4);
        assert_relative_eq!(outcome.rings[0].area(), 5000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_shape_touching_wall_splits_face() {
        let segments = vec![
            line(0.0, 0.0, 100.0, 0.0),
            line(100.0, 0.0, 100.0, 100.0),
            line(100.0, 100.0, 0.0, 100.0),
            line(0.0, 100.0, 0.0, 0.0),
            // Triangle hanging from the bottom wall at a single vertex
            line(50.0, 0.0, 30.0, 40.0),
            line(30.0, 40.0, 70.0, 40.0),
            line(70.0, 40.0, 50.0, 0.0),
        ];
        let outcome = polygonize(&segments);
        assert_eq!(outcome.stats.split_faces, 1);
        assert_eq!(outcome.rings.len(), 2);
        for ring in &outcome.rings {
            assert!(!ring.is_self_intersecting());
            let points = ring.points();
            for i in 0..points.len() {
                for j in (i + 1)..points.len() {
                    assert!(points[i].distance_to(&points[j]) > 1e-6);
                }
            }
        }
        let mut areas: Vec<f64> = outcome.rings.iter().map(|r| r.area()).collect();
        areas.sort_by(f64::total_cmp);
        assert_relative_eq!(areas[0], 800.0, epsilon = 1e-9);
        assert_relative_eq!(areas[1], 10000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_split_at_repeats() {
        let loops = split_at_repeats(&[0, 1, 2, 3, 1, 4]);
        assert_eq!(loops, vec![vec![1, 2, 3], vec![0, 1, 4]]);
        assert_eq!(split_at_repeats(&[0, 1, 2]), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let segments = vec![
            line(0.0, 0.0, 200.0, 0.0),
            line(200.0, 0.0, 200.0, 100.0),
            line(200.0, 100.0, 0.0, 100.0),
            line(0.0, 100.0, 0.0, 0.0),
            line(100.0, 0.0, 100.0, 100.0),
            line(0.0, 50.0, 100.0, 50.0),
        ];
        let forward = polygonize(&segments);
        let mut reversed: Vec<Segment> = segments.iter().rev().cloned().collect();
        reversed.swap(1, 4);
        let backward = polygonize(&reversed);
        assert_eq!(forward.rings.len(), 3);
        assert_eq!(forward.rings, backward.rings);
    }
}
