// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Walkthrough of the room extraction pipeline on a synthetic plan
//!
//! Run with: cargo run -p ifc-lite-rooms --example room_pipeline

use ifc_lite_rooms::{extract_rooms_from_ops, DrawOp, ExtractionConfig, Label, PageSize};

fn main() {
    println!("=== Room Extraction Pipeline Demo ===\n");

    let page = PageSize::new(420.0, 300.0);
    let mut config = ExtractionConfig::default();
    config.length.enabled = false;

    // Test 1: Single-line walls with a door gap in the dividing wall
    println!("Test 1: Single-line plan with a door gap...");
    let labels = vec![
        Label::new("101 OFFICE", 110.0, 150.0),
        Label::new("102 MEETING", 290.0, 150.0),
    ];
    let result = extract_rooms_from_ops(&single_line_plan(), page, labels.clone(), &config);
    report(&result);

    // Test 2: Double-line walls collapsed to centerlines and inset again
    println!("Test 2: Double-line plan, 6 unit walls...");
    config.polygon.wall_thickness = 6.0;
    let result = extract_rooms_from_ops(&double_line_plan(), page, labels, &config);
    println!(
        "  Measured wall thickness: {:?}",
        result.diagnostics.normalize.measured_thickness
    );
    report(&result);

    println!("=== Demo Complete ===");
}

fn report(result: &ifc_lite_rooms::ExtractionResult) {
    let d = &result.diagnostics;
    println!(
        "  Segments: {} in, {} filtered, {} after bridging",
        d.filter.input_count,
        d.filter.final_count,
        result.snapshots.merged.len()
    );
    println!(
        "  Rings: {} raw, {} rooms",
        result.snapshots.raw_rings.len(),
        result.rooms.len()
    );
    for room in &result.rooms {
        let summary = room.summary();
        println!(
            "    {} {:<12} number={:<5} area={:>9.1} perimeter={:>7.1}",
            room.id,
            room.name.as_deref().unwrap_or("-"),
            room.number.as_deref().unwrap_or("-"),
            summary.area,
            summary.perimeter
        );
    }
    println!();
}

/// Outer walls as one rectangle, dividing wall drawn in two runs around a door
fn single_line_plan() -> Vec<DrawOp> {
    let mut ops = vec![
        DrawOp::SetLineWidth { width: 1.0 },
        DrawOp::Rect {
            x: 30.0,
            y: 30.0,
            width: 360.0,
            height: 240.0,
        },
        DrawOp::Stroke,
    ];
    ops.extend(polyline(&[(210.0, 30.0), (210.0, 130.0)]));
    ops.extend(polyline(&[(210.0, 160.0), (210.0, 270.0)]));
    ops
}

/// Inner and outer wall faces for every wall
fn double_line_plan() -> Vec<DrawOp> {
    let rect = |x0: f64, y0: f64, x1: f64, y1: f64| DrawOp::Rect {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    };
    vec![
        DrawOp::SetLineWidth { width: 0.7 },
        rect(24.0, 24.0, 396.0, 276.0),
        DrawOp::Stroke,
        rect(30.0, 30.0, 207.0, 270.0),
        DrawOp::Stroke,
        rect(213.0, 30.0, 390.0, 270.0),
        DrawOp::Stroke,
    ]
}

fn polyline(points: &[(f64, f64)]) -> Vec<DrawOp> {
    let mut ops = Vec::with_capacity(points.len() + 1);
    for (i, &(x, y)) in points.iter().enumerate() {
        ops.push(if i == 0 {
            DrawOp::MoveTo { x, y }
        } else {
            DrawOp::LineTo { x, y }
        });
    }
    ops.push(DrawOp::Stroke);
    ops
}
