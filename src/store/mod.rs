//! Sample Store (C1)
//!
//! Per-sensor, append-only, time-ordered buffer of raw `(ts, channel,
//! value)` samples, backed by `sled` the way `storage::history::HistoryStorage`
//! keys reports by timestamp. Keys are `(sensor_id, ts_ms, channel)` encoded
//! big-endian so range scans come back in chronological order.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::{Channel, RawSample};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sample store database error: {0}")]
    Database(#[from] sled::Error),
    #[error("sample serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("sample store not initialized")]
    NotInitialized,
}

fn channel_byte(channel: Channel) -> u8 {
    match channel {
        Channel::VibrationG => 0,
        Channel::TemperatureC => 1,
    }
}

fn channel_from_byte(b: u8) -> Option<Channel> {
    match b {
        0 => Some(Channel::VibrationG),
        1 => Some(Channel::TemperatureC),
        _ => None,
    }
}

/// Encodes `(sensor_id, ts_ms, channel)` so that, within one sensor's key
/// prefix, entries sort by timestamp then channel.
fn encode_key(sensor_id: &str, ts_ms: i64, channel: Channel) -> Vec<u8> {
    let mut key = Vec::with_capacity(sensor_id.len() + 1 + 8 + 1);
    key.extend_from_slice(sensor_id.as_bytes());
    key.push(0); // separator; sensor ids never contain NUL
    key.extend_from_slice(&ts_ms.to_be_bytes());
    key.push(channel_byte(channel));
    key
}

fn sensor_prefix(sensor_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(sensor_id.len() + 1);
    key.extend_from_slice(sensor_id.as_bytes());
    key.push(0);
    key
}

fn decode_value(sensor_id: &str, key: &[u8], value: &[u8]) -> Option<RawSample> {
    let prefix_len = sensor_id.len() + 1;
    if key.len() != prefix_len + 9 {
        return None;
    }
    let mut ts_bytes = [0u8; 8];
    ts_bytes.copy_from_slice(&key[prefix_len..prefix_len + 8]);
    let ts_ms = i64::from_be_bytes(ts_bytes);
    let channel = channel_from_byte(key[prefix_len + 8])?;
    let value: f64 = serde_json::from_slice(value).ok()?;
    Some(RawSample {
        ts_ms,
        channel,
        value,
    })
}

/// Append-only per-sensor raw sample buffer.
#[derive(Clone)]
pub struct SampleStore {
    db: Arc<sled::Db>,
}

impl SampleStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// In-memory store, handy for tests and for a cold engine start with no
    /// persistence configured.
    pub fn open_temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Append a batch of samples for one sensor. Idempotent with respect to
    /// duplicate `(ts, channel)` — a repeated key overwrites with the
    /// latest value (latest-write-wins).
    pub fn append(&self, sensor_id: &str, batch: &[RawSample]) -> Result<(), StoreError> {
        for sample in batch {
            let key = encode_key(sensor_id, sample.ts_ms, sample.channel);
            let value = serde_json::to_vec(&sample.value)?;
            self.db.insert(key, value)?;
        }
        Ok(())
    }

    /// The most recent `n` samples for a sensor, oldest first.
    pub fn tail(&self, sensor_id: &str, n: usize) -> Vec<RawSample> {
        let prefix = sensor_prefix(sensor_id);
        let mut out: Vec<RawSample> = self
            .db
            .scan_prefix(&prefix)
            .rev()
            .take(n)
            .filter_map(|item| {
                let (k, v) = item.ok()?;
                decode_value(sensor_id, &k, &v)
            })
            .collect();
        out.reverse();
        out
    }

    /// All samples at or after `ts_ms`, oldest first.
    pub fn since(&self, sensor_id: &str, ts_ms: i64) -> Vec<RawSample> {
        let mut start = sensor_prefix(sensor_id);
        start.extend_from_slice(&ts_ms.to_be_bytes());
        let mut end = sensor_prefix(sensor_id);
        end.push(0xFF); // one past the channel-byte range for this sensor
        self.db
            .range(start..end)
            .filter_map(|item| {
                let (k, v) = item.ok()?;
                decode_value(sensor_id, &k, &v)
            })
            .collect()
    }

    /// All samples in `[ts_ms, now]` for a sensor, oldest first. Used to
    /// assemble the raw history handed to the resampler.
    pub fn history_since(&self, sensor_id: &str, ts_ms: i64) -> Vec<RawSample> {
        self.since(sensor_id, ts_ms)
    }

    /// Drop every sample strictly older than `older_than_ms`. Runs on a
    /// cadence and again at publish time (spec §4.1).
    pub fn trim(&self, sensor_id: &str, older_than_ms: i64) -> Result<usize, StoreError> {
        let prefix = sensor_prefix(sensor_id);
        let mut cutoff = prefix.clone();
        cutoff.extend_from_slice(&older_than_ms.to_be_bytes());
        let keys: Vec<_> = self
            .db
            .range(prefix..cutoff)
            .filter_map(|item| item.ok().map(|(k, _)| k))
            .collect();
        let removed = keys.len();
        for key in keys {
            self.db.remove(key)?;
        }
        Ok(removed)
    }

    /// The timestamp of the most recent sample for a sensor, if any.
    pub fn last_ts(&self, sensor_id: &str) -> Option<i64> {
        let prefix = sensor_prefix(sensor_id);
        self.db
            .scan_prefix(&prefix)
            .rev()
            .next()
            .and_then(|item| item.ok())
            .and_then(|(k, v)| decode_value(sensor_id, &k, &v))
            .map(|s| s.ts_ms)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}
