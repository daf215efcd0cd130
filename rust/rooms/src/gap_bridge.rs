// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Gap bridging: joins segments whose endpoints nearly touch into longer
//! chains, then closes chains that almost return to their start.
//!
//! CAD exports break wall runs at arbitrary points and leave small gaps or
//! overshoots at corners. Two chain ends are joined when:
//! - they are closer than [`IDENTICAL_POINT_DISTANCE`]: always;
//! - they continue each other in a straight line across a gap of at most the
//!   tolerance (both local directions and the gap itself aligned);
//! - they meet at a corner: near-perpendicular directions whose extensions
//!   cross within the tolerance of both ends. The crossing point becomes the
//!   new corner vertex.
//!
//! Once no pair can merge, a chain whose own two ends pass the same test, or lie
//! within [`CLOSING_TOLERANCE`] of each other, is closed into a ring.
//!
//! Chains are contracted in a disjoint set over the input indices and
//! candidates come from an endpoint grid, so each search only looks at nearby
//! chain ends. The search order is fixed (chain id ascending, identical joints
//! first, then by gap length), which makes the greedy result reproducible.

use crate::geometry::{self, direction, line_intersection};
use crate::types::{Point2D, Segment, IDENTICAL_POINT_DISTANCE};
use nalgebra::Vector2;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Two local directions are collinear above this |dot|.
const COLLINEAR_DOT: f64 = 0.95;

/// Two local directions are perpendicular below this |dot|.
const PERPENDICULAR_DOT: f64 = 0.1;

/// Chains whose ends are this close (and not coincident) are closed.
pub const CLOSING_TOLERANCE: f64 = 1.0;

/// Result of gap bridging
#[derive(Debug, Clone)]
pub struct BridgeOutcome {
    pub segments: Vec<Segment>,
    pub stats: BridgeStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStats {
    pub input_count: usize,
    /// Invalid inputs and zero-length paths, which have no direction to join
    pub degenerate_dropped: usize,
    pub identical_joins: usize,
    pub collinear_joins: usize,
    pub corner_joins: usize,
    pub closed_rings: usize,
    pub output_count: usize,
    /// Set when the iteration bound stopped merging early
    pub hit_iteration_bound: bool,
}

impl BridgeStats {
    pub fn merges(&self) -> usize {
        self.identical_joins + self.collinear_joins + self.corner_joins
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum End {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Joint {
    Identical(Point2D),
    Collinear(Point2D),
    Corner(Point2D),
}

impl Joint {
    fn point(&self) -> Point2D {
        match self {
            Joint::Identical(p) | Joint::Collinear(p) | Joint::Corner(p) => *p,
        }
    }
}

/// Disjoint set over input segment indices; the smallest index is the root.
#[derive(Debug)]
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = i;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) -> usize {
        let ra = self.find(a);
        let rb = self.find(b);
        let root = ra.min(rb);
        self.parent[ra] = root;
        self.parent[rb] = root;
        root
    }
}

/// Spatial hash of chain ends. Entries go stale when a chain is merged; they
/// are validated against the live chain on lookup.
#[derive(Debug)]
struct EndpointGrid {
    cell_size: f64,
    cells: FxHashMap<(i64, i64), Vec<(usize, End, Point2D)>>,
}

impl EndpointGrid {
    fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            cells: FxHashMap::default(),
        }
    }

    fn key(&self, p: &Point2D) -> (i64, i64) {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
        )
    }

    fn insert_chain(&mut self, id: usize, chain: &Segment) {
        for (end, p) in [(End::Start, chain.start()), (End::End, chain.end())] {
            let key = self.key(&p);
            self.cells.entry(key).or_default().push((id, end, p));
        }
    }

    fn near(&self, p: &Point2D) -> Vec<(usize, End, Point2D)> {
        let (cx, cy) = self.key(p);
        let mut found = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(entries) = self.cells.get(&(cx + dx, cy + dy)) {
                    found.extend_from_slice(entries);
                }
            }
        }
        found
    }
}

/// Merge near-touching segments into chains and close near-closed chains
pub fn bridge_gaps(segments: &[Segment], tolerance: f64) -> BridgeOutcome {
    let tolerance = tolerance.max(0.0);
    let mut stats = BridgeStats {
        input_count: segments.len(),
        ..Default::default()
    };

    let mut chains: Vec<Option<Segment>> = segments
        .iter()
        .enumerate()
        .map(|(i, s)| {
            if !s.is_valid() || !has_extent(s) {
                stats.degenerate_dropped += 1;
                return None;
            }
            let origins = if s.origins.is_empty() {
                vec![i]
            } else {
                s.origins.clone()
            };
            Some(s.clone().with_origins(origins))
        })
        .collect();

    let n = chains.len();
    let mut sets = DisjointSet::new(n);
    let mut grid = EndpointGrid::new((2.0 * tolerance).max(IDENTICAL_POINT_DISTANCE));
    for (i, chain) in chains.iter().enumerate() {
        if let Some(chain) = chain {
            grid.insert_chain(i, chain);
        }
    }

    let limit = 2 * n.max(1);
    let mut steps = 0usize;
    'passes: loop {
        steps += 1;
        let mut merged_any = false;
        for i in 0..n {
            loop {
                if steps >= limit {
                    stats.hit_iteration_bound = true;
                    break 'passes;
                }
                let Some((j, end_a, end_b, joint)) = find_partner(i, &chains, &grid, tolerance)
                else {
                    break;
                };
                let (Some(a), Some(b)) = (chains[i].take(), chains[j].take()) else {
                    break;
                };
                let merged = join_chains(&a, end_a, &b, end_b, joint.point());
                match joint {
                    Joint::Identical(_) => stats.identical_joins += 1,
                    Joint::Collinear(_) => stats.collinear_joins += 1,
                    Joint::Corner(_) => stats.corner_joins += 1,
                }
                let root = sets.union(i, j);
                grid.insert_chain(root, &merged);
                chains[root] = Some(merged);
                steps += 1;
                merged_any = true;
                if root != i {
                    break;
                }
            }
        }
        if !merged_any {
            break;
        }
    }

    if stats.hit_iteration_bound {
        tracing::warn!(
            segments = n,
            merges = stats.merges(),
            "Gap bridging stopped at its iteration bound"
        );
    }

    let mut result = Vec::new();
    for chain in chains.into_iter().flatten() {
        let chain = close_chain(chain, tolerance, &mut stats);
        result.push(chain);
    }
    stats.output_count = result.len();

    tracing::debug!(
        input = stats.input_count,
        degenerate = stats.degenerate_dropped,
        identical = stats.identical_joins,
        collinear = stats.collinear_joins,
        corner = stats.corner_joins,
        closed = stats.closed_rings,
        output = stats.output_count,
        "Bridged segment gaps"
    );

    BridgeOutcome {
        segments: result,
        stats,
    }
}

/// First mergeable partner for chain `i` in search order
fn find_partner(
    i: usize,
    chains: &[Option<Segment>],
    grid: &EndpointGrid,
    tolerance: f64,
) -> Option<(usize, End, End, Joint)> {
    let a = chains[i].as_ref()?;
    if is_ring(a) {
        return None;
    }
    let reach = (2.0 * tolerance).max(IDENTICAL_POINT_DISTANCE);

    // (identical first, gap, partner id, end of a, end of b)
    let mut candidates: Vec<(bool, f64, usize, End, End)> = Vec::new();
    for end_a in [End::Start, End::End] {
        let pa = endpoint(a, end_a);
        for (j, end_b, stored) in grid.near(&pa) {
            if j == i {
                continue;
            }
            let Some(b) = chains[j].as_ref() else {
                continue;
            };
            if endpoint(b, end_b) != stored || is_ring(b) {
                continue;
            }
            let gap = pa.distance_to(&stored);
            if gap > reach {
                continue;
            }
            candidates.push((gap >= IDENTICAL_POINT_DISTANCE, gap, j, end_a, end_b));
        }
    }
    candidates.sort_by(|x, y| {
        x.0.cmp(&y.0)
            .then(x.1.total_cmp(&y.1))
            .then(x.2.cmp(&y.2))
            .then(x.3.cmp(&y.3))
            .then(x.4.cmp(&y.4))
    });
    candidates.dedup_by(|x, y| x.2 == y.2 && x.3 == y.3 && x.4 == y.4);

    candidates.into_iter().find_map(|(_, _, j, end_a, end_b)| {
        let b = chains[j].as_ref()?;
        bridge_joint(a, end_a, b, end_b, tolerance).map(|joint| (j, end_a, end_b, joint))
    })
}

/// Joint connecting `end_a` of `a` to `end_b` of `b`, if they may be bridged.
///
/// Symmetric: swapping the two arguments yields the same joint.
fn bridge_joint(a: &Segment, end_a: End, b: &Segment, end_b: End, tolerance: f64) -> Option<Joint> {
    let pa = endpoint(a, end_a);
    let pb = endpoint(b, end_b);
    let gap = pa.distance_to(&pb);

    if gap < IDENTICAL_POINT_DISTANCE {
        return Some(Joint::Identical(pa.midpoint(&pb)));
    }

    let da = outward_direction(a, end_a)?;
    let db = outward_direction(b, end_b)?;
    let dot = da.dot(&db).abs();

    if dot > COLLINEAR_DOT {
        if gap > tolerance {
            return None;
        }
        let g = direction(&pa, &pb)?;
        if da.dot(&g).abs() > COLLINEAR_DOT && db.dot(&g).abs() > COLLINEAR_DOT {
            return Some(Joint::Collinear(pa.midpoint(&pb)));
        }
        return None;
    }

    if dot < PERPENDICULAR_DOT {
        let (corner, _, _) = line_intersection(&pa, &da, &pb, &db)?;
        if corner.is_finite()
            && corner.distance_to(&pa) <= tolerance
            && corner.distance_to(&pb) <= tolerance
        {
            return Some(Joint::Corner(corner));
        }
    }

    None
}

fn endpoint(chain: &Segment, end: End) -> Point2D {
    match end {
        End::Start => chain.start(),
        End::End => chain.end(),
    }
}

/// Direction pointing out of the chain at `end`, taken from the end point and
/// the nearest interior point that does not coincide with it.
fn outward_direction(chain: &Segment, end: End) -> Option<Vector2<f64>> {
    let tip = endpoint(chain, end);
    let distinct = |p: &&Point2D| p.distance_to(&tip) > geometry::EPSILON;
    let interior = match end {
        End::Start => chain.points.iter().skip(1).find(distinct),
        End::End => chain.points.iter().rev().skip(1).find(distinct),
    };
    direction(interior?, &tip)
}

/// At least two distinct points
fn has_extent(chain: &Segment) -> bool {
    let start = chain.start();
    chain.points.iter().any(|p| p.distance_to(&start) > geometry::EPSILON)
}

fn is_ring(chain: &Segment) -> bool {
    chain.points.len() >= 3 && chain.start().distance_to(&chain.end()) < IDENTICAL_POINT_DISTANCE
}

/// Concatenate two chains through `joint`, which replaces both joined ends.
fn join_chains(a: &Segment, end_a: End, b: &Segment, end_b: End, joint: Point2D) -> Segment {
    // Orient so the joined ends meet in the middle: first ... | ... second
    let (first, second) = match (end_a, end_b) {
        (End::End, End::Start) => (a.points.clone(), b.points.clone()),
        (End::Start, End::End) => (b.points.clone(), a.points.clone()),
        (End::Start, End::Start) => (reversed(&a.points), b.points.clone()),
        (End::End, End::End) => (a.points.clone(), reversed(&b.points)),
    };

    let mut points = Vec::with_capacity(first.len() + second.len());
    points.extend_from_slice(&first[..first.len() - 1]);
    points.push(joint);
    points.extend_from_slice(&second[1..]);
    points.dedup_by(|p, q| p.distance_to(q) < geometry::EPSILON);
    if points.len() < 2 {
        points = vec![first[0], second[second.len() - 1]];
    }

    let mut origins: Vec<usize> = a.origins.iter().chain(b.origins.iter()).copied().collect();
    origins.sort_unstable();
    origins.dedup();

    Segment::new(
        points,
        a.line_width.max(b.line_width),
        a.is_stroked || b.is_stroked,
        a.is_filled || b.is_filled,
    )
    .with_origins(origins)
}

fn reversed(points: &[Point2D]) -> Vec<Point2D> {
    points.iter().rev().copied().collect()
}

fn close_chain(chain: Segment, tolerance: f64, stats: &mut BridgeStats) -> Segment {
    if chain.points.len() < 3 {
        return chain;
    }
    let gap = chain.start().distance_to(&chain.end());
    if gap > geometry::EPSILON && gap <= CLOSING_TOLERANCE {
        stats.closed_rings += 1;
        let mut points = chain.points.clone();
        points.push(chain.start());
        return chain.derive(points);
    }

    // Three or more runs whose two free ends meet like a pair of chains would
    if chain.points.len() >= 4 && !is_ring(&chain) {
        if let Some(joint) = bridge_joint(&chain, End::End, &chain, End::Start, tolerance) {
            stats.closed_rings += 1;
            let mut points = chain.points.clone();
            let last = points.len() - 1;
            points[0] = joint.point();
            points[last] = joint.point();
            return chain.derive(points);
        }
    }
    chain
}
