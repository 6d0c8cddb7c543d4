//! Parquet persistence adapter (C10 §6 "Persistence layout").
//!
//! A single columnar file with columns `sn, timestamp (ms int), unit,
//! value`. The engine only depends on `load`/`save` primitives — it does
//! not know or care that the backing format is Parquet.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use crate::adapters::AdapterError;
use crate::domain::Channel;

/// One archived row: sensor id, millisecond timestamp, channel unit, value.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveRow {
    pub sn: String,
    pub timestamp_ms: i64,
    pub unit: String,
    pub value: f64,
}

impl ArchiveRow {
    pub fn new(sn: impl Into<String>, timestamp_ms: i64, channel: Channel, value: f64) -> Self {
        let unit = match channel {
            Channel::VibrationG => "G",
            Channel::TemperatureC => "C",
        };
        Self {
            sn: sn.into(),
            timestamp_ms,
            unit: unit.to_string(),
            value,
        }
    }
}

fn schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("sn", DataType::Utf8, false),
        Field::new("timestamp", DataType::Int64, false),
        Field::new("unit", DataType::Utf8, false),
        Field::new("value", DataType::Float64, false),
    ]))
}

fn rows_to_batch(rows: &[ArchiveRow]) -> Result<RecordBatch, AdapterError> {
    let sn: StringArray = rows.iter().map(|r| Some(r.sn.as_str())).collect();
    let timestamp: Int64Array = rows.iter().map(|r| Some(r.timestamp_ms)).collect();
    let unit: StringArray = rows.iter().map(|r| Some(r.unit.as_str())).collect();
    let value: arrow::array::Float64Array = rows.iter().map(|r| Some(r.value)).collect();

    RecordBatch::try_new(
        schema(),
        vec![Arc::new(sn), Arc::new(timestamp), Arc::new(unit), Arc::new(value)],
    )
    .map_err(|e| AdapterError::Persistence(e.to_string()))
}

/// Overwrite `path` with the full row set. Callers trim to the retention
/// horizon (default 60 days) before calling this.
pub fn save(path: &Path, rows: &[ArchiveRow]) -> Result<(), AdapterError> {
    let batch = rows_to_batch(rows)?;
    let file = File::create(path).map_err(AdapterError::Snapshot)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, schema(), Some(props))
        .map_err(|e| AdapterError::Persistence(e.to_string()))?;
    writer
        .write(&batch)
        .map_err(|e| AdapterError::Persistence(e.to_string()))?;
    writer.close().map_err(|e| AdapterError::Persistence(e.to_string()))?;
    Ok(())
}

/// Load every row from `path`. Missing files load as empty (a cold engine
/// start with no archive yet is not an error).
pub fn load(path: &Path) -> Result<Vec<ArchiveRow>, AdapterError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).map_err(AdapterError::Snapshot)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| AdapterError::Persistence(e.to_string()))?
        .build()
        .map_err(|e| AdapterError::Persistence(e.to_string()))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| AdapterError::Persistence(e.to_string()))?;
        let sn = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| AdapterError::Persistence("sn column has unexpected type".to_string()))?;
        let timestamp = batch
            .column(1)
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| AdapterError::Persistence("timestamp column has unexpected type".to_string()))?;
        let unit = batch
            .column(2)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| AdapterError::Persistence("unit column has unexpected type".to_string()))?;
        let value = batch
            .column(3)
            .as_any()
            .downcast_ref::<arrow::array::Float64Array>()
            .ok_or_else(|| AdapterError::Persistence("value column has unexpected type".to_string()))?;

        for i in 0..batch.num_rows() {
            rows.push(ArchiveRow {
                sn: sn.value(i).to_string(),
                timestamp_ms: timestamp.value(i),
                unit: unit.value(i).to_string(),
                value: value.value(i),
            });
        }
    }
    Ok(rows)
}

/// Drop every row older than `cutoff_ms`, keeping the retention horizon
/// (spec §4.1, §6).
pub fn trim(rows: Vec<ArchiveRow>, cutoff_ms: i64) -> Vec<ArchiveRow> {
    rows.into_iter().filter(|r| r.timestamp_ms >= cutoff_ms).collect()
}
