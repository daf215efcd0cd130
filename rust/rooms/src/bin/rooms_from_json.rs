// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI tool: Extract room polygons from a page of floor plan line-art
//!
//! Reads a JSON page document (`{page, segments, labels}`) as produced by a
//! vector extraction step and writes the rooms as JSON.
//!
//! Usage:
//!   rooms-from-json <page_json> [options]

use ifc_lite_rooms::{extract_rooms, ConfigProvider, ExtractionInput, ExtractionResult};
use serde::Serialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Output document
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomsDocument<'a> {
    rooms: Vec<RoomEntry<'a>>,
    metadata: &'a ifc_lite_rooms::ExtractionMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<&'a ifc_lite_rooms::Diagnostics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshots: Option<&'a ifc_lite_rooms::PipelineSnapshots>,
}

#[derive(Serialize)]
struct RoomEntry<'a> {
    #[serde(flatten)]
    room: &'a ifc_lite_rooms::Room,
    area: f64,
    perimeter: f64,
    centroid: ifc_lite_rooms::Point2D,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let input_path = &args[1];

    // Parse options
    let mut settings_path: Option<String> = None;
    let mut output_path = String::from("rooms.json");
    let mut gap_tolerance: Option<f64> = None;
    let mut wall_thickness: Option<f64> = None;
    let mut min_area: Option<f64> = None;
    let mut keep_outer = false;
    let mut remove_nested = false;
    let mut with_diagnostics = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--settings" => {
                i += 1;
                settings_path = Some(option_value(&args, i, "--settings").to_string());
            }
            "--output" => {
                i += 1;
                output_path = option_value(&args, i, "--output").to_string();
            }
            "--gap-tolerance" => {
                i += 1;
                gap_tolerance = Some(number_value(&args, i, "--gap-tolerance"));
            }
            "--wall-thickness" => {
                i += 1;
                wall_thickness = Some(number_value(&args, i, "--wall-thickness"));
            }
            "--min-area" => {
                i += 1;
                min_area = Some(number_value(&args, i, "--min-area"));
            }
            "--keep-outer" => {
                keep_outer = true;
            }
            "--remove-nested" => {
                remove_nested = true;
            }
            "--diagnostics" => {
                with_diagnostics = true;
            }
            other => {
                eprintln!("Unknown option: {}", other);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let to_stdout = output_path == "-";
    let progress = |line: String| {
        if !to_stdout {
            println!("{}", line);
        }
    };

    progress("=== Floor Plan Room Extraction ===".to_string());

    // Step 1: Load page
    progress(format!("[1/3] Loading page: {}", input_path));
    let text = fs::read_to_string(input_path).unwrap_or_else(|e| {
        eprintln!("Error: Cannot read '{}': {}", input_path, e);
        std::process::exit(1);
    });
    let input: ExtractionInput = serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("Error: Cannot parse page document '{}': {}", input_path, e);
        std::process::exit(1);
    });
    progress(format!(
        "  Page: {:.0} x {:.0}, {} segments, {} labels",
        input.page.width,
        input.page.height,
        input.segments.len(),
        input.labels.len()
    ));

    // Step 2: Resolve settings and extract
    let provider = ConfigProvider::new();
    let mut config = (*provider.get_or_default(settings_path.as_deref().map(Path::new))).clone();
    if let Some(tolerance) = gap_tolerance {
        config.polygon.gap_tolerance = tolerance;
    }
    if let Some(thickness) = wall_thickness {
        config.polygon.wall_thickness = thickness;
    }
    if let Some(area) = min_area {
        config.polygon.min_area = area;
    }
    if keep_outer {
        config.polygon.remove_outer = false;
    }
    if remove_nested {
        config.polygon.remove_nested = true;
    }

    progress("[2/3] Extracting rooms...".to_string());
    let result = extract_rooms(&input, &config);
    print_summary(&result, &progress);

    // Step 3: Write rooms
    let document = RoomsDocument {
        rooms: result
            .rooms
            .iter()
            .map(|room| {
                let summary = room.summary();
                RoomEntry {
                    room,
                    area: summary.area,
                    perimeter: summary.perimeter,
                    centroid: summary.centroid,
                }
            })
            .collect(),
        metadata: &result.metadata,
        diagnostics: with_diagnostics.then_some(&result.diagnostics),
        snapshots: with_diagnostics.then_some(&result.snapshots),
    };
    let json = serde_json::to_string_pretty(&document).unwrap_or_else(|e| {
        eprintln!("Error: Cannot serialize rooms: {}", e);
        std::process::exit(1);
    });

    if to_stdout {
        println!("{}", json);
        return;
    }

    progress(format!("[3/3] Writing rooms: {}", output_path));
    fs::write(&output_path, json).unwrap_or_else(|e| {
        eprintln!("Error: Cannot write output file '{}': {}", output_path, e);
        std::process::exit(1);
    });
    progress(String::new());
    progress(format!("Done! {} rooms written.", result.rooms.len()));
}

fn option_value<'a>(args: &'a [String], i: usize, name: &str) -> &'a str {
    match args.get(i) {
        Some(value) => value,
        None => {
            eprintln!("Missing value for {}", name);
            std::process::exit(1);
        }
    }
}

fn number_value(args: &[String], i: usize, name: &str) -> f64 {
    let raw = option_value(args, i, name);
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            eprintln!("Invalid value for {}: {}", name, raw);
            std::process::exit(1);
        }
    }
}

fn print_summary(result: &ExtractionResult, progress: &impl Fn(String)) {
    let d = &result.diagnostics;
    progress(format!(
        "  Filter:     {} -> {} segments",
        d.filter.input_count, d.filter.final_count
    ));
    progress(format!(
        "  Bridge:     {} merges, {} closed chains",
        d.bridge.merges(),
        d.bridge.closed_rings
    ));
    if d.normalize.applied {
        progress(format!(
            "  Normalize:  thickness {:.2}, {} bundles collapsed",
            d.normalize.thickness, d.normalize.collapsed_bundles
        ));
    }
    progress(format!(
        "  Polygonize: {} rings ({} dangles, {} cut edges)",
        d.polygonize.rings, d.polygonize.dangles, d.polygonize.cut_edges
    ));
    progress(format!(
        "  Refine:     {} -> {} rings",
        d.refine.input_count, d.refine.final_count
    ));
    if d.fail_open_count() > 0 {
        progress(format!("  Fail-open events: {}", d.fail_open_count()));
    }

    progress(String::new());
    progress(format!("  Rooms ({}):", result.rooms.len()));
    for room in &result.rooms {
        progress(format!(
            "    {} {:<24} area {:>12.1}",
            room.id,
            room.name.as_deref().unwrap_or("-"),
            room.polygon.area()
        ));
    }
}

fn print_usage() {
    println!(
        r#"Floor Plan Room Extraction
==========================

Extracts closed room polygons from the vector line-art of one floor plan page.

USAGE:
  rooms-from-json <page_json> [OPTIONS]

ARGUMENTS:
  <page_json>               Page document: {{"page", "segments", "labels"}}

OPTIONS:
  --settings <path>         Extraction settings JSON (default: built-in values)
  --output <path>           Output file, or - for stdout (default: rooms.json)
  --gap-tolerance <units>   Maximum gap bridged between wall ends
  --wall-thickness <units>  Collapse double wall lines of about this thickness
  --min-area <units^2>      Drop rooms smaller than this
  --keep-outer              Keep rings that contain other rooms
  --remove-nested           Drop rings contained in other rooms
  --diagnostics             Include stage counts and intermediate geometry
  -h, --help                Show this help message

PIPELINE:
  1. Filter:     stroke width, page-relative length band, length, shape
  2. Bridge:     join wall fragments across small gaps and corners
  3. Normalize:  collapse double wall lines to centerlines
  4. Polygonize: close the line network into rings
  5. Refine:     inset, outer/nested removal, area and width filters
  6. Name:       nearest text label per room

Set RUST_LOG=debug for per-stage logging."#
    );
}
