// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Segment reconstruction from page drawing operators.
//!
//! A page content stream is a sequence of path construction operators
//! followed by a paint operator. Each painted subpath becomes one [`Segment`];
//! paths ended without painting are invisible and dropped.

use crate::types::{Point2D, Segment, ShapeKind};
use serde::{Deserialize, Serialize};

/// Drawing operators relevant to line-art reconstruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DrawOp {
    MoveTo { x: f64, y: f64 },
    LineTo { x: f64, y: f64 },
    /// Cubic Bezier; only the end point is kept (straight chord)
    CurveTo {
        c1: Point2D,
        c2: Point2D,
        end: Point2D,
    },
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    ClosePath,
    SetLineWidth { width: f64 },
    Stroke,
    Fill,
    FillStroke,
    /// End the path without painting
    EndPath,
}

#[derive(Debug, Default)]
struct Subpath {
    points: Vec<Point2D>,
    has_curve: bool,
}

impl Subpath {
    fn starting_at(point: Point2D) -> Self {
        Self {
            points: vec![point],
            has_curve: false,
        }
    }
}

/// Rebuild painted segments from an operator stream
pub fn reconstruct_segments(ops: &[DrawOp]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut subpaths: Vec<Subpath> = Vec::new();
    let mut line_width = 1.0;
    let mut dropped_unpainted = 0usize;

    for op in ops {
        match op {
            DrawOp::MoveTo { x, y } => {
                subpaths.push(Subpath::starting_at(Point2D::new(*x, *y)));
            }
            DrawOp::LineTo { x, y } => {
                push_point(&mut subpaths, Point2D::new(*x, *y), false);
            }
            DrawOp::CurveTo { end, .. } => {
                push_point(&mut subpaths, *end, true);
            }
            DrawOp::Rect {
                x,
                y,
                width,
                height,
            } => {
                let origin = Point2D::new(*x, *y);
                subpaths.push(Subpath {
                    points: vec![
                        origin,
                        Point2D::new(x + width, *y),
                        Point2D::new(x + width, y + height),
                        Point2D::new(*x, y + height),
                        origin,
                    ],
                    has_curve: false,
                });
                // Drawing continues from the rectangle origin.
                subpaths.push(Subpath::starting_at(origin));
            }
            DrawOp::ClosePath => {
                if let Some(current) = subpaths.last_mut() {
                    if current.points.len() >= 2 {
                        let first = current.points[0];
                        current.points.push(first);
                        subpaths.push(Subpath::starting_at(first));
                    }
                }
            }
            DrawOp::SetLineWidth { width } => line_width = *width,
            DrawOp::Stroke | DrawOp::Fill | DrawOp::FillStroke => {
                let stroked = matches!(op, DrawOp::Stroke | DrawOp::FillStroke);
                let filled = matches!(op, DrawOp::Fill | DrawOp::FillStroke);
                for subpath in subpaths.drain(..) {
                    if subpath.points.len() < 2 {
                        continue;
                    }
                    let segment = Segment::new(subpath.points, line_width, stroked, filled);
                    segments.push(if subpath.has_curve {
                        segment.with_shape(ShapeKind::Curve)
                    } else {
                        segment
                    });
                }
            }
            DrawOp::EndPath => {
                dropped_unpainted += subpaths.iter().filter(|s| s.points.len() >= 2).count();
                subpaths.clear();
            }
        }
    }

    dropped_unpainted += subpaths.iter().filter(|s| s.points.len() >= 2).count();
    let segments: Vec<Segment> = segments
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.with_origins(vec![i]))
        .collect();

    tracing::debug!(
        operators = ops.len(),
        segments = segments.len(),
        dropped_unpainted,
        "Reconstructed segments from drawing operators"
    );

    segments
}

fn push_point(subpaths: &mut Vec<Subpath>, point: Point2D, curve: bool) {
    match subpaths.last_mut() {
        Some(current) => {
            current.points.push(point);
            current.has_curve |= curve;
        }
        // A line without a current point starts a new subpath.
        None => subpaths.push(Subpath::starting_at(point)),
    }
}
