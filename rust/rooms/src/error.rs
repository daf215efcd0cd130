// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for room extraction.

use thiserror::Error;

/// Result type for room extraction operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reconstructing rooms
#[derive(Error, Debug)]
pub enum Error {
    /// Ring with fewer than three distinct points or zero area.
    #[error("Degenerate ring: {0}")]
    DegenerateRing(String),

    /// Non-finite coordinates or an unstable construction.
    #[error("Numerical failure: {0}")]
    Numerical(String),

    #[error("Invalid segment: {0}")]
    InvalidSegment(String),

    #[error("Settings I/O error: {0}")]
    SettingsIo(#[from] std::io::Error),

    #[error("Settings parse error: {0}")]
    SettingsParse(#[from] serde_json::Error),
}
