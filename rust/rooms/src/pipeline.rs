// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end room extraction for a single page.
//!
//! Runs filter → bridge → normalize → polygonize → refine, names the final
//! rings from the page labels and returns the rooms together with diagnostics
//! and read-only snapshots of the intermediate geometry.
//!
//! A segment stage whose output fails validation is skipped: its input is
//! passed on unchanged and the event is recorded in [`Diagnostics`].

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::gap_bridge::{bridge_gaps, BridgeStats};
use crate::label_match::match_labels;
use crate::polygon::RoomPolygon;
use crate::polygon_refine::{refine_polygons, RefineStats};
use crate::polygonize::{polygonize, PolygonizeStats};
use crate::segment_filter::{filter_segments, FilterStats};
use crate::types::{ExtractionMetadata, Label, PageSize, Room, Segment};
use crate::wall_normalizer::{normalize_walls, NormalizeStats};
use serde::{Deserialize, Serialize};

/// One page worth of extracted vector content
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionInput {
    pub page: PageSize,
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub metadata: ExtractionMetadata,
}

impl ExtractionInput {
    pub fn new(page: PageSize, segments: Vec<Segment>, labels: Vec<Label>) -> Self {
        Self {
            page,
            segments,
            labels,
            metadata: ExtractionMetadata::default(),
        }
    }
}

/// A stage that was skipped because its output was unusable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailOpenEvent {
    pub stage: String,
    pub input_count: usize,
    pub message: String,
}

/// Per-stage counts for one extraction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub filter: FilterStats,
    pub bridge: BridgeStats,
    pub normalize: NormalizeStats,
    pub polygonize: PolygonizeStats,
    pub refine: RefineStats,
    pub fail_open: Vec<FailOpenEvent>,
}

impl Diagnostics {
    /// Skipped stages plus rings kept un-inset after a numerical failure
    pub fn fail_open_count(&self) -> usize {
        self.fail_open.len() + self.refine.inset_failed
    }
}

/// Intermediate geometry, for visualization and debugging only
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSnapshots {
    pub page: Option<PageSize>,
    pub filtered: Vec<Segment>,
    pub merged: Vec<Segment>,
    pub normalized: Vec<Segment>,
    pub raw_rings: Vec<RoomPolygon>,
}

/// Complete result of [`extract_rooms`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub rooms: Vec<Room>,
    pub metadata: ExtractionMetadata,
    pub diagnostics: Diagnostics,
    pub snapshots: PipelineSnapshots,
}

/// Where the page geometry comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceBackend {
    /// Vector paths drawn on the page
    Vector,
    /// Rendered page bitmap
    Raster,
}

/// Outcome of running a backend
#[derive(Debug, Clone)]
pub enum BackendOutcome {
    Extracted(ExtractionResult),
    Unavailable {
        backend: SourceBackend,
        reason: String,
    },
}

/// Run extraction through the selected backend.
///
/// Only the vector backend is built in; other backends report
/// [`BackendOutcome::Unavailable`] so callers can fall back.
pub fn extract_with_backend(
    backend: SourceBackend,
    input: &ExtractionInput,
    config: &ExtractionConfig,
) -> BackendOutcome {
    match backend {
        SourceBackend::Vector => BackendOutcome::Extracted(extract_rooms(input, config)),
        SourceBackend::Raster => {
            tracing::warn!(backend = ?backend, "Extraction backend not available");
            BackendOutcome::Unavailable {
                backend,
                reason: "raster extraction is not built into this crate".to_string(),
            }
        }
    }
}

/// Reject stage output that downstream geometry cannot work with
fn validate_segments(segments: &[Segment]) -> Result<()> {
    match segments.iter().position(|s| !s.is_valid()) {
        Some(index) => Err(Error::InvalidSegment(format!(
            "segment {} has {} points or non-finite coordinates",
            index,
            segments[index].points.len()
        ))),
        None => Ok(()),
    }
}

/// Keep `output` when it validates, otherwise fall back to `input`
fn fail_open(
    stage: &str,
    input: &[Segment],
    output: Vec<Segment>,
    diagnostics: &mut Diagnostics,
) -> Vec<Segment> {
    match validate_segments(&output) {
        Ok(()) => output,
        Err(e) => {
            tracing::warn!(
                stage,
                input = input.len(),
                output = output.len(),
                error = %e,
                "Stage failed, passing input through"
            );
            diagnostics.fail_open.push(FailOpenEvent {
                stage: stage.to_string(),
                input_count: input.len(),
                message: e.to_string(),
            });
            input.to_vec()
        }
    }
}

/// Extract rooms from one page
pub fn extract_rooms(input: &ExtractionInput, config: &ExtractionConfig) -> ExtractionResult {
    tracing::info!(
        segments = input.segments.len(),
        labels = input.labels.len(),
        page_width = input.page.width,
        page_height = input.page.height,
        "Starting room extraction"
    );

    let mut diagnostics = Diagnostics::default();

    // ─── Step 1: Filter ───
    let filtered = filter_segments(&input.segments, config, &input.page);
    diagnostics.filter = filtered.stats;
    let filtered = filtered.segments;

    // ─── Step 2: Bridge gaps ───
    let bridged = bridge_gaps(&filtered, config.polygon.gap_tolerance);
    diagnostics.bridge = bridged.stats;
    let merged = fail_open("bridge", &filtered, bridged.segments, &mut diagnostics);

    // ─── Step 3: Normalize walls ───
    let normalized = normalize_walls(&merged, &config.polygon);
    let inset_distance = normalized
        .collapsed_to_centerlines()
        .then(|| normalized.stats.thickness / 2.0);
    diagnostics.normalize = normalized.stats;
    let normalized = fail_open("normalize", &merged, normalized.segments, &mut diagnostics);

    // ─── Step 4: Polygonize ───
    let assembled = polygonize(&normalized);
    diagnostics.polygonize = assembled.stats;
    let raw_rings = assembled.rings;

    // ─── Step 5: Refine ───
    let refined = refine_polygons(raw_rings.clone(), &config.polygon, inset_distance);
    diagnostics.refine = refined.stats;

    // ─── Step 6: Name rooms ───
    let names = match_labels(&refined.rings, &input.labels);
    let rooms: Vec<Room> = refined
        .rings
        .into_iter()
        .zip(names)
        .enumerate()
        .map(|(i, (polygon, label))| Room {
            id: format!("room-{}", i + 1),
            name: Some(label.name),
            number: label.number,
            level: label.level,
            polygon,
        })
        .collect();

    tracing::info!(
        rooms = rooms.len(),
        raw_rings = raw_rings.len(),
        fail_open = diagnostics.fail_open_count(),
        "Room extraction finished"
    );

    ExtractionResult {
        rooms,
        metadata: input.metadata.clone(),
        diagnostics,
        snapshots: PipelineSnapshots {
            page: Some(input.page),
            filtered,
            merged,
            normalized,
            raw_rings,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point2D;

    fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> Segment {
        Segment::line(Point2D::new(x1, y1), Point2D::new(x2, y2))
    }

    fn permissive() -> ExtractionConfig {
        let mut config = ExtractionConfig::default();
        config.length.enabled = false;
        config.room_size.enabled = false;
        config
    }

    #[test]
    fn test_empty_input_gives_empty_rooms() {
        let input = ExtractionInput::new(PageSize::new(1000.0, 1000.0), Vec::new(), Vec::new());
        let result = extract_rooms(&input, &ExtractionConfig::default());
        assert!(result.rooms.is_empty());
        assert_eq!(result.metadata.page_count, 1);
        assert!(result.diagnostics.fail_open.is_empty());
    }

    #[test]
    fn test_single_room_named_from_label() {
        let segments = vec![
            line(0.0, 0.0, 100.0, 0.0),
            line(100.0, 0.0, 100.0, 100.0),
            line(100.0, 100.0, 0.0, 100.0),
            line(0.0, 100.0, 0.0, 0.0),
        ];
        let labels = vec![Label::new("OFFICE 204", 50.0, 50.0)];
        let input = ExtractionInput::new(PageSize::new(1000.0, 1000.0), segments, labels);
        let result = extract_rooms(&input, &permissive());

        assert_eq!(result.rooms.len(), 1);
        let room = &result.rooms[0];
        assert_eq!(room.id, "room-1");
        assert_eq!(room.name.as_deref(), Some("OFFICE 204"));
        assert_eq!(room.number.as_deref(), Some("204"));
        assert!((room.polygon.area() - 10000.0).abs() < 1e-6);
        assert_eq!(result.snapshots.raw_rings.len(), 1);
        assert_eq!(result.snapshots.page, Some(PageSize::new(1000.0, 1000.0)));
    }

    #[test]
    fn test_invalid_stage_output_passes_input_through() {
        let input = vec![line(0.0, 0.0, 10.0, 0.0)];
        let broken = vec![Segment::new(vec![Point2D::new(f64::NAN, 0.0)], 1.0, true, false)];
        let mut diagnostics = Diagnostics::default();
        let kept = fail_open("bridge", &input, broken, &mut diagnostics);
        assert_eq!(kept, input);
        assert_eq!(diagnostics.fail_open.len(), 1);
        assert_eq!(diagnostics.fail_open[0].stage, "bridge");
        assert_eq!(diagnostics.fail_open_count(), 1);
    }

    #[test]
    fn test_raster_backend_is_unavailable() {
        let input = ExtractionInput::new(PageSize::new(100.0, 100.0), Vec::new(), Vec::new());
        let config = ExtractionConfig::default();
        assert!(matches!(
            extract_with_backend(SourceBackend::Raster, &input, &config),
            BackendOutcome::Unavailable {
                backend: SourceBackend::Raster,
                ..
            }
        ));
        assert!(matches!(
            extract_with_backend(SourceBackend::Vector, &input, &config),
            BackendOutcome::Extracted(_)
        ));
    }
}
