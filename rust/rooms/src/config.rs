// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extraction settings and the settings-file provider.
//!
//! Every node deserializes with defaults, so a settings file only needs the
//! fields it overrides.

use crate::error::Result;
use crate::types::ShapeKind;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Complete configuration tree for one extraction
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtractionConfig {
    pub line_width: LineWidthFilter,
    pub length: LengthFilter,
    pub shape: ShapeFilter,
    pub polygon: PolygonSettings,
    pub room_size: RoomSizeFilter,
}

/// Stroke width range a wall path must fall in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LineWidthFilter {
    pub enabled: bool,
    pub min: f64,
    pub max: f64,
}

impl Default for LineWidthFilter {
    fn default() -> Self {
        Self {
            enabled: true,
            min: 0.5,
            max: 10.0,
        }
    }
}

/// Minimum total path length
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LengthFilter {
    pub enabled: bool,
    pub min: f64,
}

impl Default for LengthFilter {
    fn default() -> Self {
        Self {
            enabled: true,
            min: 500.0,
        }
    }
}

/// Shape classes allowed through
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ShapeFilter {
    pub enabled: bool,
    pub allowed: Vec<ShapeKind>,
}

impl Default for ShapeFilter {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed: vec![ShapeKind::Line, ShapeKind::Rectangle],
        }
    }
}

/// Polygon reconstruction and refinement settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PolygonSettings {
    /// Drop rings that are contained by another ring
    pub remove_nested: bool,
    /// Drop rings that contain another ring
    pub remove_outer: bool,
    /// Maximum endpoint gap bridged between segments
    pub gap_tolerance: f64,
    pub min_area: f64,
    /// Minimum caliper width; thinner rings are slivers
    pub min_width: f64,
    /// Wall thickness hint. Zero disables wall normalization; otherwise the
    /// thickness actually used is measured from the drawing.
    pub wall_thickness: f64,
    /// Keep both faces of double-line walls instead of collapsing them
    pub skip_collapse_parallel_walls: bool,
    /// Split interior walls into two offset lines, one per adjacent room
    pub duplicate_dividing_walls: bool,
}

impl Default for PolygonSettings {
    fn default() -> Self {
        Self {
            remove_nested: false,
            remove_outer: true,
            gap_tolerance: 50.0,
            min_area: 0.0,
            min_width: 0.0,
            wall_thickness: 0.0,
            skip_collapse_parallel_walls: false,
            duplicate_dividing_walls: false,
        }
    }
}

/// Expected number of rooms on a page, used to derive a length band
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomSizeFilter {
    pub enabled: bool,
    pub min_room_count: u32,
    pub max_room_count: u32,
}

impl Default for RoomSizeFilter {
    fn default() -> Self {
        Self {
            enabled: true,
            min_room_count: 1,
            max_room_count: 30,
        }
    }
}

impl ExtractionConfig {
    /// Parse a JSON settings document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON settings file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// Loads settings files once and hands out shared read-only copies.
///
/// Constructed by the application entry point and passed to whoever needs
/// settings. Lookups are double-checked: the file is parsed outside the lock
/// and the cache is checked again before inserting, so concurrent first
/// requests for the same path agree on one instance.
#[derive(Debug, Default)]
pub struct ConfigProvider {
    cache: Mutex<FxHashMap<PathBuf, Arc<ExtractionConfig>>>,
    defaults: Arc<ExtractionConfig>,
}

impl ConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider whose fallback is `defaults` instead of the built-in values
    pub fn with_defaults(defaults: ExtractionConfig) -> Self {
        Self {
            cache: Mutex::new(FxHashMap::default()),
            defaults: Arc::new(defaults),
        }
    }

    pub fn defaults(&self) -> Arc<ExtractionConfig> {
        Arc::clone(&self.defaults)
    }

    /// Settings for `path`, or the defaults when the file is missing or
    /// malformed. Failed loads are not cached.
    pub fn get(&self, path: &Path) -> Arc<ExtractionConfig> {
        if let Some(config) = self.lock().get(path) {
            return Arc::clone(config);
        }

        let loaded = match ExtractionConfig::from_file(path) {
            Ok(config) => Arc::new(config),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load settings, using defaults"
                );
                return self.defaults();
            }
        };

        let mut cache = self.lock();
        let entry = cache
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::clone(&loaded));
        tracing::debug!(path = %path.display(), "Loaded settings");
        Arc::clone(entry)
    }

    /// Settings for an optional path; `None` yields the defaults
    pub fn get_or_default(&self, path: Option<&Path>) -> Arc<ExtractionConfig> {
        match path {
            Some(path) => self.get(path),
            None => self.defaults(),
        }
    }

    /// Drop every cached entry
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn cached_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, FxHashMap<PathBuf, Arc<ExtractionConfig>>> {
        // The map stays consistent even if a holder panicked.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_settings(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "ifc-lite-rooms-{}-{}.json",
            name,
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = ExtractionConfig::default();
        assert!(config.line_width.enabled);
        assert_eq!(config.line_width.min, 0.5);
        assert_eq!(config.line_width.max, 10.0);
        assert_eq!(config.length.min, 500.0);
        assert!(!config.shape.enabled);
        assert_eq!(config.shape.allowed, vec![ShapeKind::Line, ShapeKind::Rectangle]);
        assert!(config.polygon.remove_outer);
        assert!(!config.polygon.remove_nested);
        assert_eq!(config.polygon.gap_tolerance, 50.0);
        assert_eq!(config.room_size.max_room_count, 30);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = ExtractionConfig::from_json(
            r#"{"polygon":{"minArea":150,"wallThickness":6},"shape":{"enabled":true,"allowed":["line"]}}"#,
        )
        .unwrap();
        assert_eq!(config.polygon.min_area, 150.0);
        assert_eq!(config.polygon.wall_thickness, 6.0);
        assert_eq!(config.polygon.gap_tolerance, 50.0);
        assert!(config.polygon.remove_outer);
        assert_eq!(config.shape.allowed, vec![ShapeKind::Line]);
        assert_eq!(config.length, LengthFilter::default());
    }

    #[test]
    fn test_provider_caches_by_path() {
        let path = temp_settings("cache", r#"{"length":{"min":42}}"#);
        let provider = ConfigProvider::new();
        let first = provider.get(&path);
        let second = provider.get(&path);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.length.min, 42.0);
        assert_eq!(provider.cached_count(), 1);

        provider.clear();
        assert_eq!(provider.cached_count(), 0);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_provider_falls_back_on_errors() {
        let provider = ConfigProvider::new();
        let missing = provider.get(Path::new("/nonexistent/ifc-lite-rooms.json"));
        assert_eq!(*missing, ExtractionConfig::default());

        let path = temp_settings("malformed", "{ not json");
        let malformed = provider.get(&path);
        assert_eq!(*malformed, ExtractionConfig::default());
        assert_eq!(provider.cached_count(), 0);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_provider_shared_across_threads() {
        let path = temp_settings("threads", r#"{"polygon":{"gapTolerance":12}}"#);
        let provider = Arc::new(ConfigProvider::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let provider = Arc::clone(&provider);
                let path = path.clone();
                std::thread::spawn(move || provider.get(&path))
            })
            .collect();
        let configs: Vec<Arc<ExtractionConfig>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        for config in &configs {
            assert!(Arc::ptr_eq(config, &configs[0]));
            assert_eq!(config.polygon.gap_tolerance, 12.0);
        }
        let _ = std::fs::remove_file(path);
    }
}
