//! Settings-file adapter (C10 §6 "Settings file").
//!
//! Reloaded between poll cycles; flipping `use_hall_compensation` swaps the
//! event log exposed to the snapshot between the ambient-compensated and
//! raw logs without recomputing anything (spec §4.9, §6).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::adapters::AdapterError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub use_hall_compensation: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_hall_compensation: true,
        }
    }
}

/// Load settings from `path`, falling back to defaults if the file is
/// missing (a missing settings file is not a fatal condition).
pub fn load(path: &Path) -> Result<Settings, AdapterError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let text = std::fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&text)?;
    Ok(settings)
}
