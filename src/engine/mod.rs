//! The diagnostic engine: C2 through C9.
//!
//! Everything here is a pure function of raw sample history plus sensor
//! profile — no shared mutable state beyond the per-sensor debounce streaks
//! and the daily-event dedup set the driver threads through explicitly.

pub mod analyzers;
pub mod driver;
pub mod error;
pub mod fuse;
pub mod health;
pub mod resample;

pub use error::EngineError;
