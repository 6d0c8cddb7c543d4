//! Atomic JSON snapshot publisher (C10 §6 "Snapshot output").
//!
//! Writes to a temp path in the same directory, then renames over the
//! target — the classic atomic-publish pattern, same one the teacher uses
//! for its dashboard state file. `NaN`/`±Infinity` are not valid JSON, so
//! every float is sanitized to `null` before serialization.

use std::path::Path;

use serde_json::Value;

use crate::adapters::AdapterError;
use crate::domain::SnapshotDocument;

/// Recursively replace non-finite floats with JSON `null`.
fn sanitize(value: Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if !f.is_finite() => Value::Null,
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, sanitize(v))).collect()),
        other => other,
    }
}

/// Serialize and atomically publish a snapshot document to `path`.
pub fn publish(doc: &SnapshotDocument, path: &Path) -> Result<(), AdapterError> {
    let raw = serde_json::to_value(doc).map_err(AdapterError::Settings)?;
    let sanitized = sanitize(raw);
    let text = serde_json::to_string_pretty(&sanitized).map_err(AdapterError::Settings)?;

    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, text)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
