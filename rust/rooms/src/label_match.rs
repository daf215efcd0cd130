// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Room naming from positioned text labels.
//!
//! Each polygon takes the text of the label nearest to its vertex centroid.
//! Polygons on a page without usable labels are named `Room <n>`. Room number
//! and level are then parsed from the chosen text.

use crate::polygon::RoomPolygon;
use crate::types::Label;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Name and parsed attributes for one polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomLabel {
    pub name: String,
    /// Index of the matched label, `None` for generated names
    pub label_index: Option<usize>,
    pub number: Option<String>,
    pub level: Option<String>,
}

/// Attributes parsed from label text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelInfo {
    pub number: Option<String>,
    pub level: Option<String>,
}

static LEVEL_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:level|lvl|floor|fl)\.?\s*([A-Z0-9]+)\b").expect("valid level regex")
});
static LEVEL_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+)\s*(?:F|FL)\s*$").expect("valid floor suffix regex"));
static LEVEL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)-").expect("valid level prefix regex"));

static NUMBER_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:room|rm|no)\.?\s*#?\s*([A-Z]?\d+[A-Z]?)\b").expect("valid room regex")
});
static NUMBER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*R(\d+)\b").expect("valid R-number regex"));
static NUMBER_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{2,})\b").expect("valid bare number regex"));

/// First capture of the first pattern that matches, with the full match span
fn first_capture(text: &str, patterns: &[&Regex]) -> Option<(String, std::ops::Range<usize>)> {
    patterns.iter().find_map(|re| {
        re.captures(text).and_then(|caps| {
            let whole = caps.get(0)?;
            let value = caps.get(1)?;
            Some((value.as_str().to_string(), whole.range()))
        })
    })
}

/// Parse level and room number from label text.
///
/// Level patterns, first match wins: a `LEVEL`/`FLOOR` keyword, a trailing
/// floor suffix such as `2F`, a leading `2-` prefix. Number patterns: a
/// `ROOM`/`RM`/`NO` keyword, a leading `R` followed by digits, a bare token of
/// two or more digits. The bare token never reuses the text of the level match.
pub fn parse_label(text: &str) -> LabelInfo {
    let level = first_capture(text, &[&*LEVEL_KEYWORD, &*LEVEL_SUFFIX, &*LEVEL_PREFIX]);

    let number = first_capture(text, &[&*NUMBER_KEYWORD, &*NUMBER_PREFIX]).or_else(|| {
        let remainder = match &level {
            Some((_, span)) => {
                let mut masked = text.to_string();
                masked.replace_range(span.clone(), &" ".repeat(span.len()));
                masked
            }
            None => text.to_string(),
        };
        first_capture(&remainder, &[&*NUMBER_BARE])
    });

    LabelInfo {
        number: number.map(|(value, _)| value),
        level: level.map(|(value, _)| value),
    }
}

/// Index of the label closest to `point`; the first one seen wins ties.
fn nearest_label(point: &crate::types::Point2D, labels: &[Label]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, label) in labels.iter().enumerate() {
        let center = label.center();
        if !center.is_finite() || label.text.trim().is_empty() {
            continue;
        }
        let d = point.distance_to(&center);
        if best.map_or(true, |(_, best_d)| d < best_d) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

/// Name every polygon, in polygon order.
pub fn match_labels(polygons: &[RoomPolygon], labels: &[Label]) -> Vec<RoomLabel> {
    let result: Vec<RoomLabel> = polygons
        .iter()
        .enumerate()
        .map(|(i, polygon)| match nearest_label(&polygon.vertex_centroid(), labels) {
            Some(index) => {
                let name = labels[index].text.trim().to_string();
                let info = parse_label(&name);
                RoomLabel {
                    name,
                    label_index: Some(index),
                    number: info.number,
                    level: info.level,
                }
            }
            None => RoomLabel {
                name: format!("Room {}", i + 1),
                label_index: None,
                number: None,
                level: None,
            },
        })
        .collect();

    tracing::debug!(
        polygons = polygons.len(),
        labels = labels.len(),
        named = result.iter().filter(|r| r.label_index.is_some()).count(),
        "Matched labels"
    );

    result
}
