//! Per-channel diagnostic analyzers (C3-C6).
//!
//! Each analyzer is a pure function over an interval row (plus whatever
//! rolling context it needs) that fills in one status column. None of them
//! mutate shared state; the engine driver (C9) threads rolling context
//! through explicitly.

pub mod baseline;
pub mod gradient;
pub mod rcf;
pub mod skf;
