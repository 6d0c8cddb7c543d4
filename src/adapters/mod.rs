//! External Adapters (C10)
//!
//! Thin collaborators the diagnostic engine is independent of: the vendor
//! HTTP fetch client, Parquet archive persistence, the atomic JSON snapshot
//! publisher, and the settings-file watcher. Grounded on
//! `acquisition::{AcquisitionError, SensorSource}`'s error/trait shape.

pub mod http;
pub mod parquet_store;
pub mod settings;
pub mod snapshot;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("sensor fetch failed: {0}")]
    Fetch(String),

    #[error("sensor fetch timed out after {0}ms")]
    Timeout(u64),

    #[error("malformed sample: {0}")]
    MalformedSample(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("snapshot publish error: {0}")]
    Snapshot(#[from] std::io::Error),

    #[error("settings parse error: {0}")]
    Settings(#[from] serde_json::Error),
}
