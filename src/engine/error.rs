//! Errors internal to the pure analyzer pipeline.
//!
//! Deliberately small: per spec, analyzer channels degrade to a safe status
//! rather than propagate a hard failure, so this is reserved for invariants
//! that should never occur given a well-formed sample.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("insufficient history: {0}")]
    InsufficientHistory(String),

    #[error("malformed sample: {0}")]
    MalformedSample(String),
}
