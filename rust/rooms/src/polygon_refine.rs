// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Post-processing of assembled rings into the rooms a reader would expect.
//!
//! Applied in this order, each step only when enabled:
//! 1. Inset centerline rings by half the wall thickness
//! 2. Remove containing (outer) and/or contained (nested) rings
//! 3. Drop rings below the minimum area
//! 4. Drop slivers below the minimum width
//!
//! Insetting runs first because it changes which rings touch or contain each
//! other.

use crate::config::PolygonSettings;
use crate::polygon::RoomPolygon;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Boundary slack for containment and duplicate tests.
pub const CONTAINMENT_TOLERANCE: f64 = 0.5;

/// Result of ring refinement
#[derive(Debug, Clone)]
pub struct RefineOutcome {
    pub rings: Vec<RoomPolygon>,
    pub stats: RefineStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineStats {
    pub input_count: usize,
    /// Rings that vanished when inset
    pub inset_collapsed: usize,
    /// Rings kept unchanged because the inset failed numerically
    pub inset_failed: usize,
    pub duplicates_removed: usize,
    pub outer_removed: usize,
    pub nested_removed: usize,
    pub below_min_area: usize,
    pub below_min_width: usize,
    pub final_count: usize,
}

/// Run every enabled refinement step.
///
/// `inset_distance` is half the wall thickness when rings follow wall
/// centerlines, `None` when they already follow room faces.
pub fn refine_polygons(
    rings: Vec<RoomPolygon>,
    settings: &PolygonSettings,
    inset_distance: Option<f64>,
) -> RefineOutcome {
    let mut stats = RefineStats {
        input_count: rings.len(),
        ..Default::default()
    };

    // Step 1: Inset
    let rings = match inset_distance {
        Some(distance) if distance != 0.0 => inset_all(rings, distance, &mut stats),
        _ => rings,
    };

    // Step 2: Outer / nested removal
    let rings = if settings.remove_outer || settings.remove_nested {
        remove_contained(rings, settings.remove_outer, settings.remove_nested, &mut stats)
    } else {
        rings
    };

    // Step 3: Minimum area
    let before = rings.len();
    let rings = apply_min_area(rings, settings.min_area);
    stats.below_min_area = before - rings.len();

    // Step 4: Minimum width
    let before = rings.len();
    let rings = apply_min_width(rings, settings.min_width);
    stats.below_min_width = before - rings.len();

    stats.final_count = rings.len();

    tracing::debug!(
        input = stats.input_count,
        inset_collapsed = stats.inset_collapsed,
        inset_failed = stats.inset_failed,
        duplicates = stats.duplicates_removed,
        outer = stats.outer_removed,
        nested = stats.nested_removed,
        min_area = stats.below_min_area,
        min_width = stats.below_min_width,
        kept = stats.final_count,
        "Refined rings"
    );

    RefineOutcome { rings, stats }
}

fn inset_all(rings: Vec<RoomPolygon>, distance: f64, stats: &mut RefineStats) -> Vec<RoomPolygon> {
    let mut result = Vec::with_capacity(rings.len());
    for ring in rings {
        match ring.inset(distance) {
            Ok(Some(inset)) => result.push(inset),
            Ok(None) => stats.inset_collapsed += 1,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    vertices = ring.len(),
                    distance,
                    "Inset failed, keeping ring unchanged"
                );
                stats.inset_failed += 1;
                result.push(ring);
            }
        }
    }
    result
}

/// Total order used for containment decisions: larger rings first, then by
/// vertex centroid.
fn containment_order(a: &RoomPolygon, b: &RoomPolygon) -> Ordering {
    let (ca, cb) = (a.vertex_centroid(), b.vertex_centroid());
    b.area()
        .total_cmp(&a.area())
        .then(ca.x.total_cmp(&cb.x))
        .then(ca.y.total_cmp(&cb.y))
}

/// Two rings describing the same region within the tolerance
fn near_duplicate(a: &RoomPolygon, b: &RoomPolygon, tolerance: f64) -> bool {
    let perimeter = a.perimeter().max(b.perimeter());
    (a.area() - b.area()).abs() <= tolerance * perimeter
        && a.points().iter().all(|p| b.covers_point(p, tolerance))
        && b.points().iter().all(|p| a.covers_point(p, tolerance))
}

/// Drop near-duplicates, then containing rings, then contained rings.
///
/// Rings are ranked by [`containment_order`]; duplicates keep the first
/// ranked copy. Outer removal discards every ring that contains any other
/// ring of the set, so no survivor contains another. Nested removal then
/// discards rings contained by any ring that survived the outer pass. Each
/// pass decides all rings against the same set, so the result does not
/// depend on the order the pairs are visited in. Input order is preserved.
fn remove_contained(
    rings: Vec<RoomPolygon>,
    remove_outer: bool,
    remove_nested: bool,
    stats: &mut RefineStats,
) -> Vec<RoomPolygon> {
    let tol = CONTAINMENT_TOLERANCE;
    let mut ranked: Vec<usize> = (0..rings.len()).collect();
    ranked.sort_by(|&a, &b| containment_order(&rings[a], &rings[b]).then(a.cmp(&b)));

    let mut keep = vec![true; rings.len()];

    for (pos, &i) in ranked.iter().enumerate() {
        if !keep[i] {
            continue;
        }
        for &j in &ranked[pos + 1..] {
            if keep[j] && near_duplicate(&rings[i], &rings[j], tol) {
                keep[j] = false;
                stats.duplicates_removed += 1;
            }
        }
    }

    let candidates: Vec<usize> = ranked.iter().copied().filter(|&i| keep[i]).collect();

    if remove_outer {
        let outer: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&i| {
                candidates
                    .iter()
                    .any(|&j| j != i && rings[i].contains(&rings[j], tol))
            })
            .collect();
        stats.outer_removed = outer.len();
        for i in outer {
            keep[i] = false;
        }
    }

    if remove_nested {
        let survivors: Vec<usize> = candidates.iter().copied().filter(|&i| keep[i]).collect();
        let nested: Vec<usize> = survivors
            .iter()
            .copied()
            .filter(|&i| {
                survivors
                    .iter()
                    .any(|&j| j != i && rings[j].contains(&rings[i], tol))
            })
            .collect();
        stats.nested_removed = nested.len();
        for i in nested {
            keep[i] = false;
        }
    }

    rings
        .into_iter()
        .zip(keep)
        .filter_map(|(ring, keep)| keep.then_some(ring))
        .collect()
}

/// Keep rings with at least `min_area`; a non-positive threshold keeps all
pub fn apply_min_area(rings: Vec<RoomPolygon>, min_area: f64) -> Vec<RoomPolygon> {
    if min_area <= 0.0 {
        return rings;
    }
    rings.into_iter().filter(|r| r.area() >= min_area).collect()
}

/// Keep rings whose minimum bounding width is at least `min_width`
pub fn apply_min_width(rings: Vec<RoomPolygon>, min_width: f64) -> Vec<RoomPolygon> {
    if min_width <= 0.0 {
        return rings;
    }
    rings.into_iter().filter(|r| r.min_width() >= min_width).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point2D;
    use approx::assert_relative_eq;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> RoomPolygon {
        RoomPolygon::new(vec![
            Point2D::new(x0, y0),
            Point2D::new(x1, y0),
            Point2D::new(x1, y1),
            Point2D::new(x0, y1),
        ])
        .unwrap()
    }

    fn settings() -> PolygonSettings {
        PolygonSettings::default()
    }

    #[test]
    fn test_min_area_discards_small_room() {
        let mut config = settings();
        config.min_area = 150.0;
        let outcome = refine_polygons(vec![rect(0.0, 0.0, 10.0, 10.0)], &config, None);
        assert!(outcome.rings.is_empty());
        assert_eq!(outcome.stats.below_min_area, 1);
    }

    #[test]
    fn test_remove_outer_keeps_inner() {
        let outer = rect(0.0, 0.0, 20.0, 20.0);
        let inner = rect(5.0, 5.0, 15.0, 15.0);
        let outcome = refine_polygons(vec![outer, inner.clone()], &settings(), None);
        assert_eq!(outcome.rings, vec![inner]);
        assert_eq!(outcome.stats.outer_removed, 1);
    }

    #[test]
    fn test_remove_nested_keeps_outer() {
        let mut config = settings();
        config.remove_outer = false;
        config.remove_nested = true;
        let outer = rect(0.0, 0.0, 20.0, 20.0);
        let inner = rect(5.0, 5.0, 15.0, 15.0);
        let outcome = refine_polygons(vec![inner, outer.clone()], &config, None);
        assert_eq!(outcome.rings, vec![outer]);
    }

    #[test]
    fn test_adjacent_rooms_are_not_nested() {
        let rings = vec![rect(0.0, 0.0, 100.0, 100.0), rect(100.0, 0.0, 200.0, 100.0)];
        let outcome = refine_polygons(rings.clone(), &settings(), None);
        assert_eq!(outcome.rings, rings);
    }

    #[test]
    fn test_no_survivor_contains_another() {
        let rings = vec![
            rect(0.0, 0.0, 300.0, 300.0),
            rect(10.0, 10.0, 140.0, 290.0),
            rect(20.0, 20.0, 60.0, 60.0),
            rect(160.0, 10.0, 290.0, 290.0),
            rect(400.0, 0.0, 500.0, 100.0),
        ];
        let outcome = refine_polygons(rings, &settings(), None);
        assert_eq!(outcome.rings.len(), 3);
        for a in &outcome.rings {
            for b in &outcome.rings {
                assert!(!a.contains(b, CONTAINMENT_TOLERANCE));
            }
        }
    }

    #[test]
    fn test_near_duplicates_collapse_to_one() {
        let a = rect(0.0, 0.0, 100.0, 100.0);
        let b = rect(0.1, 0.0, 100.0, 100.1);
        let outcome = refine_polygons(vec![a, b], &settings(), None);
        assert_eq!(outcome.rings.len(), 1);
        assert_eq!(outcome.stats.duplicates_removed, 1);
    }

    #[test]
    fn test_min_width_drops_slivers() {
        let mut config = settings();
        config.min_width = 10.0;
        let rings = vec![rect(0.0, 0.0, 200.0, 6.0), rect(0.0, 10.0, 200.0, 110.0)];
        let outcome = refine_polygons(rings, &config, None);
        assert_eq!(outcome.rings.len(), 1);
        assert_eq!(outcome.stats.below_min_width, 1);
    }

    #[test]
    fn test_area_and_width_filters_are_idempotent() {
        let rings = vec![
            rect(0.0, 0.0, 10.0, 10.0),
            rect(0.0, 20.0, 200.0, 24.0),
            rect(50.0, 50.0, 120.0, 110.0),
        ];
        let once = apply_min_width(apply_min_area(rings, 150.0), 8.0);
        let twice = apply_min_width(apply_min_area(once.clone(), 150.0), 8.0);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 1);
    }

    #[test]
    fn test_inset_shrinks_and_drops() {
        let outcome = refine_polygons(
            vec![rect(0.0, 0.0, 106.0, 106.0), rect(200.0, 0.0, 204.0, 50.0)],
            &settings(),
            Some(3.0),
        );
        assert_eq!(outcome.rings.len(), 1);
        assert_eq!(outcome.stats.inset_collapsed, 1);
        assert_relative_eq!(outcome.rings[0].area(), 100.0 * 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_inset_failure_keeps_ring() {
        let ring = rect(0.0, 0.0, 10.0, 10.0);
        let outcome = refine_polygons(vec![ring.clone()], &settings(), Some(f64::INFINITY));
        assert_eq!(outcome.rings, vec![ring]);
        assert_eq!(outcome.stats.inset_failed, 1);
    }
}
