//! bearing-sentinel: condition-monitoring engine for rotating machinery.
//!
//! ## Architecture
//!
//! - **Sample Store**: per-sensor raw `(ts, channel, value)` history.
//! - **Engine**: resampling, behavioral scheduling, the four analyzers
//!   (crest-factor, adaptive baseline, thermal gradient, isolation forest),
//!   alarm fusion, and the composite Health Index / RUL computation.
//! - **Adapters**: vendor HTTP fetch, Parquet archive, atomic snapshot
//!   publisher, settings-file reload.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod engine;
pub mod store;

pub use config::EngineConfig;
pub use domain::{
    AnalyzerTag, Channel, DiagnosticEvent, IntervalRow, RawSample, RiskBucket, SensorProfile,
    SnapshotDocument, SnapshotSensor, Status,
};
pub use store::{SampleStore, StoreError};
