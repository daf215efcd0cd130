// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall-line normalization for double-line floor plans.
//!
//! Architectural drawings draw each wall as two parallel faces. Before rings
//! can be assembled, the faces are reduced to something the polygonizer can
//! close:
//! 1. Measure: modal separation between overlapping parallel lines
//! 2. Collapse each face bundle into a centerline (or keep the two outer faces)
//! 3. Merge collinear fragments split by door and window openings
//! 4. Extend open endpoints onto the line they run into
//! 5. Drop lines that connect to nothing at either end
//! 6. Optionally split dividing walls into one line per adjacent room
//!
//! The stage only runs when a positive wall thickness is configured; the
//! configured value is a hint and the thickness actually used is measured.

use crate::config::PolygonSettings;
use crate::geometry::{
    direction, left_normal, line_intersection, perpendicular_distance, point_to_segment_distance,
    EPSILON,
};
use crate::types::{Point2D, Segment};
use nalgebra::Vector2;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Lines are parallel above this |dot| (about 5 degrees).
const PARALLEL_DOT: f64 = 0.996;

/// Parallel lines must share at least this fraction of the shorter one.
const MIN_OVERLAP_FRACTION: f64 = 0.3;

const HISTOGRAM_BIN: f64 = 0.5;
const MIN_MEASURED_SEPARATION: f64 = 0.5;

/// Bundles are gathered up to this multiple of the wall thickness.
const BUNDLE_SPAN_FACTOR: f64 = 1.5;

const EXTEND_REACH_FACTOR: f64 = 4.0;
const OPEN_LINE_FACTOR: f64 = 2.0;
const COLLINEAR_GAP_FACTOR: f64 = 4.0;
const COLLINEAR_OFFSET_FACTOR: f64 = 0.25;

/// Result of wall normalization
#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    /// Straight two-point wall lines
    pub segments: Vec<Segment>,
    pub stats: NormalizeStats,
}

impl NormalizeOutcome {
    /// Whether wall faces were replaced by centerlines, so rings follow wall
    /// centers rather than room interiors.
    pub fn collapsed_to_centerlines(&self) -> bool {
        self.stats.applied && !self.stats.kept_inner_boundaries
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeStats {
    pub applied: bool,
    /// Thickness measured from the drawing, if any pair was measurable
    pub measured_thickness: Option<f64>,
    /// Thickness used by every sub-pass
    pub thickness: f64,
    pub kept_inner_boundaries: bool,
    pub collapsed_bundles: usize,
    pub inner_lines_removed: usize,
    pub collinear_merged: usize,
    pub extended_endpoints: usize,
    pub removed_open: usize,
    pub duplicated_walls: usize,
}

/// Normalize wall lines according to `settings`
pub fn normalize_walls(segments: &[Segment], settings: &PolygonSettings) -> NormalizeOutcome {
    let hint = settings.wall_thickness;
    if hint <= 0.0 || !hint.is_finite() {
        return NormalizeOutcome {
            segments: segments.to_vec(),
            stats: NormalizeStats::default(),
        };
    }

    let lines = explode_lines(segments);
    let measured = measure_wall_thickness(&lines, hint);
    let thickness = measured.unwrap_or(hint);
    let mut stats = NormalizeStats {
        applied: true,
        measured_thickness: measured,
        thickness,
        kept_inner_boundaries: settings.skip_collapse_parallel_walls,
        ..Default::default()
    };

    let lines = if settings.skip_collapse_parallel_walls {
        let (lines, removed) = extract_inner_boundaries(&lines, thickness);
        stats.inner_lines_removed = removed;
        lines
    } else {
        let (lines, bundles) = collapse_parallel_walls(&lines, thickness);
        stats.collapsed_bundles = bundles;
        lines
    };

    let before = lines.len();
    let lines = merge_collinear_segments(
        &lines,
        thickness * COLLINEAR_OFFSET_FACTOR,
        thickness * COLLINEAR_GAP_FACTOR,
    );
    stats.collinear_merged = before - lines.len();

    let mut lines = lines;
    stats.extended_endpoints =
        extend_to_intersections(&mut lines, thickness * EXTEND_REACH_FACTOR, thickness);

    let before = lines.len();
    let lines = filter_open_lines(&lines, thickness * OPEN_LINE_FACTOR);
    stats.removed_open = before - lines.len();

    let lines = if settings.duplicate_dividing_walls && !settings.skip_collapse_parallel_walls {
        let (lines, duplicated) = duplicate_dividing_walls(&lines, thickness);
        stats.duplicated_walls = duplicated;
        lines
    } else {
        lines
    };

    tracing::debug!(
        input = segments.len(),
        thickness = stats.thickness,
        measured = ?stats.measured_thickness,
        collapsed = stats.collapsed_bundles,
        inner_removed = stats.inner_lines_removed,
        collinear_merged = stats.collinear_merged,
        extended = stats.extended_endpoints,
        removed_open = stats.removed_open,
        duplicated = stats.duplicated_walls,
        output = lines.len(),
        "Normalized wall lines"
    );

    NormalizeOutcome {
        segments: lines,
        stats,
    }
}

/// Split polylines into straight two-point lines, dropping zero-length pieces
pub fn explode_lines(segments: &[Segment]) -> Vec<Segment> {
    segments
        .iter()
        .flat_map(|s| {
            s.points
                .windows(2)
                .filter(|w| w[0].distance_to(&w[1]) > EPSILON)
                .map(|w| s.derive(vec![w[0], w[1]]))
                .collect::<Vec<_>>()
        })
        .collect()
}

// ─── Step 1: Thickness Measurement ──────────────────────────────────────────

/// Modal perpendicular separation between overlapping parallel lines.
///
/// Separations between [`MIN_MEASURED_SEPARATION`] and four times the hint are
/// binned at [`HISTOGRAM_BIN`]; the mean of the fullest bin is returned. Ties
/// go to the thinner bin.
pub fn measure_wall_thickness(lines: &[Segment], hint: f64) -> Option<f64> {
    let max_separation = hint * 4.0;
    let mut separations = Vec::new();

    for i in 0..lines.len() {
        for j in (i + 1)..lines.len() {
            if let Some(separation) = parallel_separation(&lines[i], &lines[j]) {
                if (MIN_MEASURED_SEPARATION..=max_separation).contains(&separation) {
                    separations.push(separation);
                }
            }
        }
    }

    if separations.is_empty() {
        return None;
    }

    let mut bins: FxHashMap<i64, Vec<f64>> = FxHashMap::default();
    for s in separations {
        bins.entry((s / HISTOGRAM_BIN).floor() as i64)
            .or_default()
            .push(s);
    }

    let (_, modal) = bins
        .iter()
        .max_by(|a, b| a.1.len().cmp(&b.1.len()).then(b.0.cmp(a.0)))?;
    Some(modal.iter().sum::<f64>() / modal.len() as f64)
}

/// Perpendicular distance between two parallel lines that overlap in extent
fn parallel_separation(a: &Segment, b: &Segment) -> Option<f64> {
    let da = line_direction(a)?;
    let db = line_direction(b)?;
    if da.dot(&db).abs() < PARALLEL_DOT {
        return None;
    }
    if overlap_fraction(a, &da, b) <= MIN_OVERLAP_FRACTION {
        return None;
    }
    let mid = b.start().midpoint(&b.end());
    Some(perpendicular_distance(&mid, &a.start(), &a.end()))
}

// ─── Step 2: Collapse / Inner Boundaries ────────────────────────────────────

/// Group overlapping parallel lines lying within a wall's width of each other.
///
/// Each group starts at the first unused line and takes every later line that
/// is parallel, overlapping, and within the bundle span of that first line.
fn wall_bundles(lines: &[Segment], thickness: f64) -> Vec<Vec<usize>> {
    let span = thickness * BUNDLE_SPAN_FACTOR;
    let mut used = vec![false; lines.len()];
    let mut bundles = Vec::new();

    for i in 0..lines.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let mut group = vec![i];
        for j in (i + 1)..lines.len() {
            if used[j] {
                continue;
            }
            if parallel_separation(&lines[i], &lines[j]).is_some_and(|d| d <= span) {
                group.push(j);
                used[j] = true;
            }
        }
        bundles.push(group);
    }
    bundles
}

/// Replace each bundle of wall faces by its centerline.
///
/// Returns the new lines and the number of bundles that were collapsed.
fn collapse_parallel_walls(lines: &[Segment], thickness: f64) -> (Vec<Segment>, usize) {
    let mut collapsed = 0;
    let mut result = Vec::new();
    for bundle in wall_bundles(lines, thickness) {
        if bundle.len() == 1 {
            result.push(lines[bundle[0]].clone());
            continue;
        }
        let group: Vec<&Segment> = bundle.iter().map(|&i| &lines[i]).collect();
        if let Some(centerline) = centerline_of(&group) {
            collapsed += 1;
            result.push(centerline);
        } else {
            result.extend(group.into_iter().cloned());
        }
    }
    (result, collapsed)
}

/// Keep only the two outermost faces of each bundle.
///
/// The outermost faces are the ones bordering rooms; anything drawn between
/// them (hatching, core lines) is dropped. A face may be drawn in several
/// collinear pieces, one per adjoining room, and every piece is kept.
fn extract_inner_boundaries(lines: &[Segment], thickness: f64) -> (Vec<Segment>, usize) {
    let face_tolerance = thickness * COLLINEAR_OFFSET_FACTOR;
    let mut removed = 0;
    let mut result = Vec::new();
    for bundle in wall_bundles(lines, thickness) {
        if bundle.len() <= 2 {
            result.extend(bundle.iter().map(|&i| lines[i].clone()));
            continue;
        }
        let base = &lines[bundle[0]];
        let Some(dir) = line_direction(base) else {
            result.extend(bundle.iter().map(|&i| lines[i].clone()));
            continue;
        };
        let normal = left_normal(&dir);
        let offsets: Vec<f64> = bundle
            .iter()
            .map(|&i| {
                let s = &lines[i];
                (s.start().midpoint(&s.end()).to_vector() - base.start().to_vector()).dot(&normal)
            })
            .collect();
        let low = offsets.iter().copied().fold(f64::INFINITY, f64::min);
        let high = offsets.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        for (&i, &offset) in bundle.iter().zip(&offsets) {
            if offset - low <= face_tolerance || high - offset <= face_tolerance {
                result.push(lines[i].clone());
            } else {
                removed += 1;
            }
        }
    }
    (result, removed)
}

/// Centerline of a bundle: the midline between its extreme faces over the
/// union of their extents, oriented like the longest face.
fn centerline_of(group: &[&Segment]) -> Option<Segment> {
    let longest = group.iter().max_by(|a, b| a.length.total_cmp(&b.length))?;
    let dir = line_direction(longest)?;
    let normal = left_normal(&dir);
    let origin = longest.start();

    let mut along = (f64::INFINITY, f64::NEG_INFINITY);
    let mut across = (f64::INFINITY, f64::NEG_INFINITY);
    for line in group {
        for p in [line.start(), line.end()] {
            let v = p.to_vector() - origin.to_vector();
            let a = v.dot(&dir);
            let c = v.dot(&normal);
            along = (along.0.min(a), along.1.max(a));
            across = (across.0.min(c), across.1.max(c));
        }
    }
    let center = (across.0 + across.1) / 2.0;
    let base = origin.offset(&normal, center);
    Some(merged_line(
        group,
        base.offset(&dir, along.0),
        base.offset(&dir, along.1),
    ))
}

// ─── Step 3: Collinear Merge ────────────────────────────────────────────────

/// Merge collinear fragments separated by gaps up to `max_gap`.
///
/// Groups grow against their aggregate extent, so a chain A-B-C merges even
/// when A and C alone are too far apart.
fn merge_collinear_segments(lines: &[Segment], max_offset: f64, max_gap: f64) -> Vec<Segment> {
    let mut merged = Vec::new();
    let mut used = vec![false; lines.len()];

    for i in 0..lines.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let mut group = vec![i];

        let mut changed = true;
        while changed {
            changed = false;
            for j in 0..lines.len() {
                if used[j] {
                    continue;
                }
                if is_collinear_with_group(lines, &group, j, max_offset, max_gap) {
                    group.push(j);
                    used[j] = true;
                    changed = true;
                }
            }
        }

        if group.len() == 1 {
            merged.push(lines[i].clone());
        } else {
            let group_lines: Vec<&Segment> = group.iter().map(|&idx| &lines[idx]).collect();
            match merge_collinear_group(&group_lines) {
                Some(line) => merged.push(line),
                None => merged.extend(group_lines.into_iter().cloned()),
            }
        }
    }

    merged
}

fn is_collinear_with_group(
    lines: &[Segment],
    group: &[usize],
    j: usize,
    max_offset: f64,
    max_gap: f64,
) -> bool {
    let base = &lines[group[0]];
    let candidate = &lines[j];
    let (Some(d0), Some(dj)) = (line_direction(base), line_direction(candidate)) else {
        return false;
    };
    if d0.dot(&dj).abs() < PARALLEL_DOT {
        return false;
    }

    // Same infinite line
    let (a, b) = (base.start(), base.end());
    if perpendicular_distance(&candidate.start(), &a, &b) > max_offset
        || perpendicular_distance(&candidate.end(), &a, &b) > max_offset
    {
        return false;
    }

    // Gap between the candidate and the group's aggregate extent
    let proj = |p: &Point2D| (p.to_vector() - a.to_vector()).dot(&d0);
    let (mut group_min, mut group_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for &idx in group {
        for p in [lines[idx].start(), lines[idx].end()] {
            group_min = group_min.min(proj(&p));
            group_max = group_max.max(proj(&p));
        }
    }
    let (pj1, pj2) = (proj(&candidate.start()), proj(&candidate.end()));
    let (j_min, j_max) = (pj1.min(pj2), pj1.max(pj2));
    let gap = if j_max < group_min {
        group_min - j_max
    } else if j_min > group_max {
        j_min - group_max
    } else {
        0.0
    };
    gap <= max_gap
}

/// One line spanning the whole group, on the group's mean offset
fn merge_collinear_group(group: &[&Segment]) -> Option<Segment> {
    let longest = group.iter().max_by(|a, b| a.length.total_cmp(&b.length))?;
    let dir = line_direction(longest)?;
    let normal = left_normal(&dir);
    let origin = longest.start();

    let mut along = (f64::INFINITY, f64::NEG_INFINITY);
    let mut offset_sum = 0.0;
    let mut count = 0usize;
    for line in group {
        for p in [line.start(), line.end()] {
            let v = p.to_vector() - origin.to_vector();
            along = (along.0.min(v.dot(&dir)), along.1.max(v.dot(&dir)));
            offset_sum += v.dot(&normal);
            count += 1;
        }
    }
    let base = origin.offset(&normal, offset_sum / count as f64);
    Some(merged_line(
        group,
        base.offset(&dir, along.0),
        base.offset(&dir, along.1),
    ))
}

// ─── Step 4: Extend to Intersections ────────────────────────────────────────

/// Extend open endpoints forward onto the nearest line their ray hits within
/// `reach`. Hits may fall up to `overshoot` past the end of the target line so
/// two lines stopping just short of a shared corner both reach it.
///
/// Returns the number of endpoints moved.
fn extend_to_intersections(lines: &mut [Segment], reach: f64, overshoot: f64) -> usize {
    let mut extended = 0;
    // A second pass lets lines reach targets that were extended after them.
    for _ in 0..2 {
        let mut changed = false;
        for i in 0..lines.len() {
            for at_start in [true, false] {
                let (tip, back) = if at_start {
                    (lines[i].start(), lines[i].end())
                } else {
                    (lines[i].end(), lines[i].start())
                };
                if touches_other_line(lines, i, &tip, 1e-6) {
                    continue;
                }
                let Some(dir) = direction(&back, &tip) else {
                    continue;
                };
                let Some(hit) = nearest_ray_hit(lines, i, &tip, &dir, reach, overshoot) else {
                    continue;
                };
                let points = if at_start {
                    vec![hit, back]
                } else {
                    vec![back, hit]
                };
                lines[i] = lines[i].derive(points);
                extended += 1;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    extended
}

fn nearest_ray_hit(
    lines: &[Segment],
    skip: usize,
    origin: &Point2D,
    dir: &Vector2<f64>,
    reach: f64,
    overshoot: f64,
) -> Option<Point2D> {
    let mut best: Option<(f64, Point2D)> = None;
    for (j, other) in lines.iter().enumerate() {
        if j == skip {
            continue;
        }
        let Some(other_dir) = line_direction(other) else {
            continue;
        };
        if dir.dot(&other_dir).abs() > PARALLEL_DOT {
            continue;
        }
        let Some((hit, t, s)) = line_intersection(origin, dir, &other.start(), &other_dir) else {
            continue;
        };
        if t <= EPSILON || t > reach || s < -overshoot || s > other.length + overshoot {
            continue;
        }
        if best.map_or(true, |(bt, _)| t < bt) {
            best = Some((t, hit));
        }
    }
    best.map(|(_, hit)| hit)
}

// ─── Step 5: Open Line Filter ───────────────────────────────────────────────

/// Drop lines whose endpoints are both farther than `tolerance` from every
/// other line.
fn filter_open_lines(lines: &[Segment], tolerance: f64) -> Vec<Segment> {
    if lines.len() <= 1 {
        return Vec::new();
    }
    lines
        .iter()
        .enumerate()
        .filter(|(i, line)| {
            touches_other_line(lines, *i, &line.start(), tolerance)
                || touches_other_line(lines, *i, &line.end(), tolerance)
        })
        .map(|(_, line)| line.clone())
        .collect()
}

fn touches_other_line(lines: &[Segment], skip: usize, point: &Point2D, tolerance: f64) -> bool {
    lines.iter().enumerate().any(|(j, other)| {
        j != skip && point_to_segment_distance(point, &other.start(), &other.end()) <= tolerance
    })
}

// ─── Step 6: Dividing Wall Duplication ──────────────────────────────────────

/// Replace every dividing wall by two copies offset half a thickness to each
/// side.
///
/// A dividing wall is connected at both ends and has other lines on both
/// sides along the normal through its midpoint.
fn duplicate_dividing_walls(lines: &[Segment], thickness: f64) -> (Vec<Segment>, usize) {
    let connect = thickness.max(EPSILON);
    let mut duplicated = 0;
    let mut result = Vec::with_capacity(lines.len());

    for (i, line) in lines.iter().enumerate() {
        let Some(dir) = line_direction(line) else {
            result.push(line.clone());
            continue;
        };
        let both_ends_connected = touches_other_line(lines, i, &line.start(), connect)
            && touches_other_line(lines, i, &line.end(), connect);
        let normal = left_normal(&dir);
        let mid = line.start().midpoint(&line.end());
        let dividing = both_ends_connected
            && nearest_ray_hit(lines, i, &mid, &normal, f64::INFINITY, 0.0).is_some()
            && nearest_ray_hit(lines, i, &mid, &(-normal), f64::INFINITY, 0.0).is_some();

        if dividing {
            let half = thickness / 2.0;
            for side in [half, -half] {
                result.push(line.derive(vec![
                    line.start().offset(&normal, side),
                    line.end().offset(&normal, side),
                ]));
            }
            duplicated += 1;
        } else {
            result.push(line.clone());
        }
    }
    (result, duplicated)
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn line_direction(line: &Segment) -> Option<Vector2<f64>> {
    direction(&line.start(), &line.end())
}

/// Shared extent of `b` on `a`'s direction, as a fraction of the shorter line
fn overlap_fraction(a: &Segment, dir: &Vector2<f64>, b: &Segment) -> f64 {
    let origin = a.start().to_vector();
    let proj = |p: &Point2D| (p.to_vector() - origin).dot(dir);
    let (a1, a2) = (proj(&a.start()), proj(&a.end()));
    let (b1, b2) = (proj(&b.start()), proj(&b.end()));
    let (min_a, max_a) = (a1.min(a2), a1.max(a2));
    let (min_b, max_b) = (b1.min(b2), b1.max(b2));
    let overlap = (max_a.min(max_b) - min_a.max(min_b)).max(0.0);
    let shorter = (max_a - min_a).min(max_b - min_b);
    if shorter < EPSILON {
        return 0.0;
    }
    overlap / shorter
}

/// Two-point line carrying the combined attributes of `group`
fn merged_line(group: &[&Segment], start: Point2D, end: Point2D) -> Segment {
    let mut origins: Vec<usize> = group.iter().flat_map(|s| s.origins.iter().copied()).collect();
    origins.sort_unstable();
    origins.dedup();
    Segment::new(
        vec![start, end],
        group.iter().map(|s| s.line_width).fold(0.0, f64::max),
        group.iter().any(|s| s.is_stroked),
        group.iter().any(|s| s.is_filled),
    )
    .with_origins(origins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> Segment {
        Segment::line(Point2D::new(x1, y1), Point2D::new(x2, y2))
    }

    fn square(min: f64, max: f64) -> Segment {
        Segment::new(
            vec![
                Point2D::new(min, min),
                Point2D::new(max, min),
                Point2D::new(max, max),
                Point2D::new(min, max),
                Point2D::new(min, min),
            ],
            1.0,
            true,
            false,
        )
    }

    fn settings(thickness: f64) -> PolygonSettings {
        PolygonSettings {
            wall_thickness: thickness,
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_without_thickness() {
        let segments = vec![square(0.0, 100.0)];
        let outcome = normalize_walls(&segments, &settings(0.0));
        assert!(!outcome.stats.applied);
        assert_eq!(outcome.segments, segments);
    }

    #[test]
    fn test_measure_modal_separation() {
        let lines = explode_lines(&[square(0.0, 106.0), square(6.0, 100.0)]);
        let measured = measure_wall_thickness(&lines, 5.0).unwrap();
        assert_relative_eq!(measured, 6.0, epsilon = 1e-9);
        assert!(measure_wall_thickness(&[line(0.0, 0.0, 10.0, 10.0)], 5.0).is_none());
    }

    #[test]
    fn test_collapse_pair_to_centerline() {
        let lines = vec![line(0.0, 0.0, 100.0, 0.0), line(10.0, 6.0, 120.0, 6.0)];
        let (collapsed, bundles) = collapse_parallel_walls(&lines, 6.0);
        assert_eq!(bundles, 1);
        assert_eq!(collapsed.len(), 1);
        let c = &collapsed[0];
        assert_relative_eq!(c.start().y, 3.0, epsilon = 1e-9);
        assert_relative_eq!(c.end().y, 3.0, epsilon = 1e-9);
        assert_relative_eq!(c.start().x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(c.end().x, 120.0, epsilon = 1e-9);
        assert_eq!(c.origins.len(), 0);
    }

    #[test]
    fn test_inner_boundaries_keep_outer_faces() {
        let lines = vec![
            line(0.0, 3.0, 100.0, 3.0),
            line(0.0, 0.0, 100.0, 0.0),
            line(0.0, 6.0, 100.0, 6.0),
        ];
        let (kept, removed) = extract_inner_boundaries(&lines, 6.0);
        assert_eq!(removed, 1);
        let mut ys: Vec<f64> = kept.iter().map(|l| l.start().y).collect();
        ys.sort_by(f64::total_cmp);
        assert_eq!(ys, vec![0.0, 6.0]);
    }

    #[test]
    fn test_inner_boundaries_keep_split_faces() {
        // Two rooms share the inner face line of one exterior wall
        let lines = vec![
            line(0.0, 0.0, 206.0, 0.0),
            line(6.0, 6.0, 100.0, 6.0),
            line(106.0, 6.0, 200.0, 6.0),
        ];
        let (kept, removed) = extract_inner_boundaries(&lines, 6.0);
        assert_eq!(removed, 0);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_merge_collinear_across_opening() {
        let lines = vec![
            line(0.0, 0.0, 40.0, 0.0),
            line(90.0, 0.0, 100.0, 0.0),
            line(50.0, 0.0, 80.0, 0.0),
            line(0.0, 50.0, 100.0, 50.0),
        ];
        let merged = merge_collinear_segments(&lines, 1.0, 20.0);
        assert_eq!(merged.len(), 2);
        assert_relative_eq!(merged[0].length, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_extend_onto_crossing_line() {
        let mut lines = vec![line(0.0, 0.0, 100.0, 0.0), line(110.0, -50.0, 110.0, 50.0)];
        let moved = extend_to_intersections(&mut lines, 24.0, 6.0);
        assert_eq!(moved, 1);
        assert_relative_eq!(lines[0].end().x, 110.0, epsilon = 1e-9);
        assert_relative_eq!(lines[0].end().y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_extend_closes_short_corner() {
        // Both lines stop 4 units short of their shared corner
        let mut lines = vec![line(0.0, 0.0, 96.0, 0.0), line(100.0, 4.0, 100.0, 80.0)];
        extend_to_intersections(&mut lines, 24.0, 6.0);
        assert!(lines[0].end().distance_to(&Point2D::new(100.0, 0.0)) < 1e-9);
        assert!(lines[1].start().distance_to(&Point2D::new(100.0, 0.0)) < 1e-9);
    }

    #[test]
    fn test_open_lines_removed() {
        let lines = vec![
            line(0.0, 0.0, 100.0, 0.0),
            line(100.0, 0.0, 100.0, 100.0),
            line(500.0, 500.0, 600.0, 500.0),
        ];
        let kept = filter_open_lines(&lines, 12.0);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_double_line_room_normalizes_to_centerlines() {
        let segments = vec![square(0.0, 106.0), square(6.0, 100.0)];
        let outcome = normalize_walls(&segments, &settings(5.0));
        assert!(outcome.collapsed_to_centerlines());
        assert_relative_eq!(outcome.stats.thickness, 6.0, epsilon = 1e-9);
        assert_eq!(outcome.stats.collapsed_bundles, 4);
        assert_eq!(outcome.segments.len(), 4);
        for s in &outcome.segments {
            let on_center = |v: f64| (v - 3.0).abs() < 1e-9 || (v - 103.0).abs() < 1e-9;
            let horizontal = (s.start().y - s.end().y).abs() < 1e-9;
            assert!(if horizontal { on_center(s.start().y) } else { on_center(s.start().x) });
        }
    }

    #[test]
    fn test_dividing_wall_duplicated_when_enabled() {
        let segments = vec![
            line(0.0, 0.0, 200.0, 0.0),
            line(200.0, 0.0, 200.0, 100.0),
            line(200.0, 100.0, 0.0, 100.0),
            line(0.0, 100.0, 0.0, 0.0),
            line(100.0, 0.0, 100.0, 100.0),
        ];
        let mut config = settings(6.0);
        config.duplicate_dividing_walls = true;
        let outcome = normalize_walls(&segments, &config);
        assert_eq!(outcome.stats.duplicated_walls, 1);
        assert_eq!(outcome.segments.len(), 6);
        let mut xs: Vec<f64> = outcome
            .segments
            .iter()
            .filter(|s| (s.start().x - s.end().x).abs() < 1e-9)
            .map(|s| s.start().x)
            .collect();
        xs.sort_by(f64::total_cmp);
        assert_eq!(xs.len(), 4);
        assert_relative_eq!(xs[1], 97.0, epsilon = 1e-9);
        assert_relative_eq!(xs[2], 103.0, epsilon = 1e-9);

        config.duplicate_dividing_walls = false;
        assert_eq!(normalize_walls(&segments, &config).stats.duplicated_walls, 0);
    }
}
