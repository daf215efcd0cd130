// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core types for room boundary reconstruction

use crate::polygon::RoomPolygon;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Two points closer than this are treated as the same drawing point.
pub const IDENTICAL_POINT_DISTANCE: f64 = 0.1;

/// A point in page drawing units
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn offset(&self, v: &Vector2<f64>, distance: f64) -> Self {
        Self::new(self.x + v.x * distance, self.y + v.y * distance)
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self, other: &Point2D) -> Point2D {
        Point2D::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Coarse shape classification of a drawn path
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Point,
    Line,
    Rectangle,
    Curve,
    Polyline,
}

impl ShapeKind {
    /// Classify a point sequence by its geometry alone.
    ///
    /// Curves cannot be recognised from chords, so path reconstruction tags
    /// them explicitly.
    pub fn classify(points: &[Point2D]) -> ShapeKind {
        let distinct = distinct_points(points);
        match distinct.len() {
            0 | 1 => ShapeKind::Point,
            2 => ShapeKind::Line,
            _ if is_rectangle(points) => ShapeKind::Rectangle,
            _ if all_collinear(&distinct) => ShapeKind::Line,
            _ => ShapeKind::Polyline,
        }
    }
}

fn distinct_points(points: &[Point2D]) -> Vec<Point2D> {
    let mut distinct: Vec<Point2D> = Vec::with_capacity(points.len());
    for p in points {
        if distinct
            .iter()
            .all(|q| q.distance_to(p) >= IDENTICAL_POINT_DISTANCE)
        {
            distinct.push(*p);
        }
    }
    distinct
}

fn all_collinear(points: &[Point2D]) -> bool {
    let a = points[0];
    let b = points[points.len() - 1];
    let span = a.distance_to(&b);
    if span < IDENTICAL_POINT_DISTANCE {
        return false;
    }
    points
        .iter()
        .all(|p| crate::geometry::perpendicular_distance(p, &a, &b) < IDENTICAL_POINT_DISTANCE)
}

/// Four corners with right angles, optionally closed by a fifth point.
fn is_rectangle(points: &[Point2D]) -> bool {
    let corners: &[Point2D] = match points.len() {
        4 => points,
        5 if points[0].distance_to(&points[4]) < IDENTICAL_POINT_DISTANCE => &points[..4],
        _ => return false,
    };
    (0..4).all(|i| {
        let prev = corners[(i + 3) % 4];
        let curr = corners[i];
        let next = corners[(i + 1) % 4];
        match (
            crate::geometry::direction(&prev, &curr),
            crate::geometry::direction(&curr, &next),
        ) {
            (Some(d1), Some(d2)) => d1.dot(&d2).abs() < 0.01,
            _ => false,
        }
    })
}

/// A drawn path as delivered by the vector extraction collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRecord {
    pub points: Vec<Point2D>,
    #[serde(default)]
    pub line_width: f64,
    #[serde(default = "default_true")]
    pub is_stroked: bool,
    #[serde(default)]
    pub is_filled: bool,
}

fn default_true() -> bool {
    true
}

/// Polyline candidate for a wall.
///
/// Stages never mutate a segment; they build new ones and carry the indices of
/// the input segments they were made from in `origins`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", from = "SegmentRecord")]
pub struct Segment {
    pub points: Vec<Point2D>,
    pub line_width: f64,
    pub is_stroked: bool,
    pub is_filled: bool,
    /// Total polyline length
    pub length: f64,
    pub shape: ShapeKind,
    /// Input segment indices this segment descends from
    pub origins: Vec<usize>,
}

impl Segment {
    pub fn new(points: Vec<Point2D>, line_width: f64, is_stroked: bool, is_filled: bool) -> Self {
        let shape = ShapeKind::classify(&points);
        let length = polyline_length(&points);
        Self {
            points,
            line_width,
            is_stroked,
            is_filled,
            length,
            shape,
            origins: Vec::new(),
        }
    }

    /// Straight two-point segment with default stroke settings.
    pub fn line(start: Point2D, end: Point2D) -> Self {
        Self::new(vec![start, end], 1.0, true, false)
    }

    pub fn with_origins(mut self, origins: Vec<usize>) -> Self {
        self.origins = origins;
        self
    }

    pub fn with_shape(mut self, shape: ShapeKind) -> Self {
        self.shape = shape;
        self
    }

    /// New segment with other points but the same attributes and origins.
    pub fn derive(&self, points: Vec<Point2D>) -> Self {
        Segment::new(points, self.line_width, self.is_stroked, self.is_filled)
            .with_origins(self.origins.clone())
    }

    pub fn is_valid(&self) -> bool {
        self.points.len() >= 2 && self.points.iter().all(Point2D::is_finite)
    }

    pub fn start(&self) -> Point2D {
        self.points[0]
    }

    pub fn end(&self) -> Point2D {
        self.points[self.points.len() - 1]
    }

    pub fn is_closed(&self) -> bool {
        self.points.len() >= 4 && self.start().distance_to(&self.end()) < 1e-9
    }
}

impl From<SegmentRecord> for Segment {
    fn from(record: SegmentRecord) -> Self {
        Segment::new(
            record.points,
            record.line_width,
            record.is_stroked,
            record.is_filled,
        )
    }
}

pub fn polyline_length(points: &[Point2D]) -> f64 {
    points.windows(2).map(|w| w[0].distance_to(&w[1])).sum()
}

/// A positioned text run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub text: String,
    pub center_x: f64,
    pub center_y: f64,
}

impl Label {
    pub fn new(text: impl Into<String>, center_x: f64, center_y: f64) -> Self {
        Self {
            text: text.into(),
            center_x,
            center_y,
        }
    }

    pub fn center(&self) -> Point2D {
        Point2D::new(self.center_x, self.center_y)
    }
}

/// Page dimensions in drawing units
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Final extracted room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: Option<String>,
    /// Room number parsed from the matched label
    pub number: Option<String>,
    /// Level parsed from the matched label
    pub level: Option<String>,
    pub polygon: RoomPolygon,
}

impl Room {
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            area: self.polygon.area(),
            perimeter: self.polygon.perimeter(),
            centroid: self.polygon.area_centroid(),
        }
    }
}

/// Measurements a DTO mapper needs for a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: String,
    pub name: Option<String>,
    pub area: f64,
    pub perimeter: f64,
    /// Area-weighted centroid
    pub centroid: Point2D,
}

/// Metadata returned alongside the rooms
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionMetadata {
    pub units: String,
    pub page_count: usize,
    /// Drawing units per meter, when the caller knows it
    pub scale: Option<f64>,
}

impl Default for ExtractionMetadata {
    fn default() -> Self {
        Self {
            units: "pt".to_string(),
            page_count: 1,
            scale: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(coords: &[(f64, f64)]) -> Vec<Point2D> {
        coords.iter().map(|&(x, y)| Point2D::new(x, y)).collect()
    }

    #[test]
    fn test_classify_shapes() {
        assert_eq!(ShapeKind::classify(&pts(&[(1.0, 1.0), (1.05, 1.0)])), ShapeKind::Point);
        assert_eq!(ShapeKind::classify(&pts(&[(0.0, 0.0), (10.0, 0.0)])), ShapeKind::Line);
        assert_eq!(
            ShapeKind::classify(&pts(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0)])),
            ShapeKind::Line
        );
        assert_eq!(
            ShapeKind::classify(&pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0), (0.0, 0.0)])),
            ShapeKind::Rectangle
        );
        assert_eq!(
            ShapeKind::classify(&pts(&[(0.0, 0.0), (10.0, 0.0), (12.0, 5.0)])),
            ShapeKind::Polyline
        );
    }

    #[test]
    fn test_segment_length() {
        let seg = Segment::new(pts(&[(0.0, 0.0), (3.0, 4.0), (3.0, 10.0)]), 1.0, true, false);
        assert!((seg.length - 11.0).abs() < 1e-9);
        assert_eq!(seg.start(), Point2D::new(0.0, 0.0));
        assert_eq!(seg.end(), Point2D::new(3.0, 10.0));
    }

    #[test]
    fn test_segment_from_record_json() {
        let json = r#"{"points":[{"x":0,"y":0},{"x":100,"y":0}],"lineWidth":2.0,"isStroked":true,"isFilled":false}"#;
        let seg: Segment = serde_json::from_str(json).unwrap();
        assert_eq!(seg.shape, ShapeKind::Line);
        assert!((seg.length - 100.0).abs() < 1e-9);
        assert!((seg.line_width - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_label_json() {
        let label: Label = serde_json::from_str(r#"{"text":"KITCHEN","centerX":5.0,"centerY":7.5}"#).unwrap();
        assert_eq!(label.center(), Point2D::new(5.0, 7.5));
    }
}
