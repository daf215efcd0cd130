// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Room boundary reconstruction from floor plan line-art
//!
//! This crate turns the vector strokes of an architectural floor plan into
//! closed room polygons:
//! 1. Filtering paths that are unlikely to be walls
//! 2. Bridging gaps between wall fragments
//! 3. Normalizing double wall lines to centerlines
//! 4. Polygonizing the resulting line network
//! 5. Refining rings (inset, outer/nested removal, area and width filters)
//! 6. Naming rooms from nearby text labels
//!
//! # Usage
//!
//! ```rust,ignore
//! use ifc_lite_rooms::{extract_rooms, ExtractionConfig, ExtractionInput, PageSize};
//!
//! let input = ExtractionInput::new(PageSize::new(842.0, 595.0), segments, labels);
//! let result = extract_rooms(&input, &ExtractionConfig::default());
//!
//! for room in &result.rooms {
//!     println!("{:?}: {:.1}", room.name, room.polygon.area());
//! }
//! ```

pub mod config;
pub mod error;
pub mod gap_bridge;
pub mod geometry;
pub mod label_match;
pub mod path_ops;
pub mod pipeline;
pub mod polygon;
pub mod polygon_refine;
pub mod polygonize;
pub mod segment_filter;
pub mod types;
pub mod wall_normalizer;

// Re-export commonly used types and functions
pub use config::{ConfigProvider, ExtractionConfig, PolygonSettings};
pub use error::{Error, Result};
pub use gap_bridge::bridge_gaps;
pub use label_match::{match_labels, parse_label, LabelInfo, RoomLabel};
pub use path_ops::{reconstruct_segments, DrawOp};
pub use pipeline::{
    extract_rooms, extract_with_backend, BackendOutcome, Diagnostics, ExtractionInput,
    ExtractionResult, PipelineSnapshots, SourceBackend,
};
pub use polygon::RoomPolygon;
pub use polygon_refine::refine_polygons;
pub use polygonize::polygonize;
pub use segment_filter::filter_segments;
pub use types::{
    ExtractionMetadata, Label, PageSize, Point2D, Room, RoomSummary, Segment, ShapeKind,
};
pub use wall_normalizer::normalize_walls;

use std::path::Path;

/// Extract rooms from a raw drawing-operator stream
///
/// Convenience function that rebuilds paths from the operators and runs the
/// full pipeline.
///
/// # Arguments
///
/// * `ops` - Drawing operators of one page, in paint order
/// * `page` - Page dimensions in drawing units
/// * `labels` - Positioned text runs of the same page
/// * `config` - Extraction thresholds
pub fn extract_rooms_from_ops(
    ops: &[DrawOp],
    page: PageSize,
    labels: Vec<Label>,
    config: &ExtractionConfig,
) -> ExtractionResult {
    let segments = reconstruct_segments(ops);
    extract_rooms(&ExtractionInput::new(page, segments, labels), config)
}

/// Extract rooms using settings loaded through `provider`
///
/// Falls back to the provider defaults when `settings_path` is `None` or the
/// file cannot be used.
pub fn extract_rooms_with_settings(
    input: &ExtractionInput,
    provider: &ConfigProvider,
    settings_path: Option<&Path>,
) -> ExtractionResult {
    let config = provider.get_or_default(settings_path);
    extract_rooms(input, &config)
}
