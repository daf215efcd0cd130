// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Removes paths that are unlikely to be walls.
//!
//! Filters run in a fixed order and each one is skipped when disabled:
//! 1. Stroke width within the configured range
//! 2. Length band derived from the page size and expected room count
//! 3. Minimum total length
//! 4. Shape allow-list

use crate::config::ExtractionConfig;
use crate::types::{PageSize, Segment};
use serde::{Deserialize, Serialize};

/// Result of segment filtering
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    /// Segments that passed every enabled filter, in input order
    pub segments: Vec<Segment>,
    pub stats: FilterStats,
}

/// Discard counts per filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStats {
    pub input_count: usize,
    pub removed_invalid: usize,
    pub removed_line_width: usize,
    pub removed_room_size: usize,
    pub removed_length: usize,
    pub removed_shape: usize,
    pub final_count: usize,
}

impl FilterStats {
    pub fn removed_total(&self) -> usize {
        self.input_count - self.final_count
    }
}

/// Length band implied by the expected room count on a page.
///
/// The lower bound is the smaller of `width / maxRoomCount` and
/// `height / maxRoomCount`, the upper bound the larger of `width / minRoomCount`
/// and `height / minRoomCount`, so each side takes the more permissive value.
pub fn room_size_band(page: &PageSize, min_room_count: u32, max_room_count: u32) -> (f64, f64) {
    let max_count = f64::from(max_room_count.max(1));
    let min_count = f64::from(min_room_count.max(1));
    let lower = (page.width / max_count).min(page.height / max_count);
    let upper = (page.width / min_count).max(page.height / min_count);
    (lower, upper)
}

/// Apply the enabled filters of `config` to `segments`
pub fn filter_segments(
    segments: &[Segment],
    config: &ExtractionConfig,
    page: &PageSize,
) -> FilterOutcome {
    let mut stats = FilterStats {
        input_count: segments.len(),
        ..Default::default()
    };

    // Step 0: Structurally broken paths never reach the geometry stages.
    // Survivors remember their input index unless they already carry origins.
    let mut kept: Vec<Segment> = segments
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_valid())
        .map(|(i, s)| {
            if s.origins.is_empty() {
                s.clone().with_origins(vec![i])
            } else {
                s.clone()
            }
        })
        .collect();
    stats.removed_invalid = segments.len() - kept.len();

    // Step 1: Stroke width
    if config.line_width.enabled {
        let (min, max) = (config.line_width.min, config.line_width.max);
        let before = kept.len();
        kept.retain(|s| s.line_width >= min && s.line_width <= max);
        stats.removed_line_width = before - kept.len();
    }

    // Step 2: Room-size length band
    if config.room_size.enabled {
        let (lower, upper) = room_size_band(
            page,
            config.room_size.min_room_count,
            config.room_size.max_room_count,
        );
        let before = kept.len();
        kept.retain(|s| s.length >= lower && s.length <= upper);
        stats.removed_room_size = before - kept.len();
    }

    // Step 3: Minimum length
    if config.length.enabled {
        let min = config.length.min;
        let before = kept.len();
        kept.retain(|s| s.length >= min);
        stats.removed_length = before - kept.len();
    }

    // Step 4: Shape allow-list
    if config.shape.enabled {
        let before = kept.len();
        kept.retain(|s| config.shape.allowed.contains(&s.shape));
        stats.removed_shape = before - kept.len();
    }

    stats.final_count = kept.len();

    tracing::debug!(
        input = stats.input_count,
        invalid = stats.removed_invalid,
        line_width = stats.removed_line_width,
        room_size = stats.removed_room_size,
        length = stats.removed_length,
        shape = stats.removed_shape,
        kept = stats.final_count,
        "Filtered segments"
    );

    FilterOutcome {
        segments: kept,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Point2D, ShapeKind};

    fn seg(x1: f64, y1: f64, x2: f64, y2: f64, width: f64) -> Segment {
        Segment::new(
            vec![Point2D::new(x1, y1), Point2D::new(x2, y2)],
            width,
            true,
            false,
        )
    }

    fn all_disabled() -> ExtractionConfig {
        let mut config = ExtractionConfig::default();
        config.line_width.enabled = false;
        config.length.enabled = false;
        config.shape.enabled = false;
        config.room_size.enabled = false;
        config
    }

    #[test]
    fn test_room_size_band_is_permissive() {
        let (lower, upper) = room_size_band(&PageSize::new(1000.0, 600.0), 2, 10);
        assert!((lower - 60.0).abs() < 1e-12);
        assert!((upper - 500.0).abs() < 1e-12);
    }

    #[test]
    fn test_disabled_filters_are_noops() {
        let segments = vec![seg(0.0, 0.0, 1.0, 0.0, 0.1), seg(0.0, 0.0, 900.0, 0.0, 40.0)];
        let outcome = filter_segments(&segments, &all_disabled(), &PageSize::new(1000.0, 1000.0));
        assert_eq!(outcome.segments.len(), 2);
        assert_eq!(outcome.stats.removed_total(), 0);
    }

    #[test]
    fn test_each_filter_counts_discards() {
        let segments = vec![
            seg(0.0, 0.0, 600.0, 0.0, 1.0),  // passes everything
            seg(0.0, 0.0, 600.0, 0.0, 20.0), // too wide
            seg(0.0, 0.0, 10.0, 0.0, 1.0),   // below room-size band
            seg(0.0, 0.0, 200.0, 0.0, 1.0),  // inside band, below min length
            Segment::new(
                vec![
                    Point2D::new(0.0, 0.0),
                    Point2D::new(300.0, 0.0),
                    Point2D::new(400.0, 300.0),
                ],
                1.0,
                true,
                false,
            ), // polyline
        ];
        let mut config = ExtractionConfig::default();
        config.shape.enabled = true;
        let outcome = filter_segments(&segments, &config, &PageSize::new(1000.0, 1000.0));
        assert_eq!(outcome.segments.len(), 1);
        assert_eq!(outcome.segments[0].shape, ShapeKind::Line);
        assert_eq!(outcome.stats.removed_line_width, 1);
        assert_eq!(outcome.stats.removed_room_size, 1);
        assert_eq!(outcome.stats.removed_length, 1);
        assert_eq!(outcome.stats.removed_shape, 1);
        assert_eq!(outcome.stats.final_count, 1);
    }

    #[test]
    fn test_survivors_keep_input_indices() {
        let segments = vec![
            seg(0.0, 0.0, 1.0, 0.0, 20.0),
            Segment::new(vec![Point2D::new(0.0, 0.0)], 1.0, true, false),
            seg(0.0, 0.0, 100.0, 0.0, 1.0),
            seg(0.0, 5.0, 100.0, 5.0, 1.0).with_origins(vec![9]),
        ];
        let mut config = all_disabled();
        config.line_width.enabled = true;
        let outcome = filter_segments(&segments, &config, &PageSize::new(1000.0, 1000.0));
        assert_eq!(outcome.stats.removed_invalid, 1);
        assert_eq!(outcome.stats.removed_line_width, 1);
        let origins: Vec<&[usize]> = outcome.segments.iter().map(|s| s.origins.as_slice()).collect();
        assert_eq!(origins, [&[2][..], &[9][..]]);
    }

    #[test]
    fn test_enabling_a_filter_never_adds_segments() {
        let segments: Vec<Segment> = (0..40)
            .map(|i| {
                let len = 50.0 + 40.0 * i as f64;
                seg(0.0, i as f64, len, i as f64, 0.25 * (i % 8) as f64)
            })
            .collect();
        let page = PageSize::new(1200.0, 800.0);
        let base = all_disabled();
        let base_count = filter_segments(&segments, &base, &page).segments.len();

        let toggles: [fn(&mut ExtractionConfig); 4] = [
            |c| c.line_width.enabled = true,
            |c| c.length.enabled = true,
            |c| c.shape.enabled = true,
            |c| c.room_size.enabled = true,
        ];
        for toggle in toggles {
            let mut config = base.clone();
            toggle(&mut config);
            let count = filter_segments(&segments, &config, &page).segments.len();
            assert!(count <= base_count);
        }
    }
}
