//! Inbound raw-sample fetch adapter (C10 §6 "Inbound sample source").
//!
//! Pulls `(from_ms, to_ms, limit)` windows per sensor from the vendor REST
//! API, concurrency-capped by a semaphore. Malformed records are dropped
//! silently rather than failing the whole batch (spec §7.2); a non-200 or
//! timeout just skips that sensor for the cycle (spec §7.1) — the caller's
//! watermark does not advance for an empty result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Semaphore;

use crate::adapters::AdapterError;
use crate::domain::{Channel, RawSample};

#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Fetch raw samples for one sensor in `[from_ms, to_ms)`, capped at
    /// `limit` rows. Returns an empty vec on transient failure rather than
    /// propagating an error — the cycle watermark simply doesn't advance.
    async fn fetch(&self, sensor_id: &str, from_ms: i64, to_ms: i64, limit: usize) -> Vec<RawSample>;
}

#[derive(Debug, Deserialize)]
struct IndexedValue {
    index: u32,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct WireItem {
    #[serde(default)]
    timestamp: Option<serde_json::Value>,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    values: Option<Vec<IndexedValue>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireResponse {
    Array(Vec<WireItem>),
    Wrapped { items: Vec<WireItem> },
}

fn parse_timestamp(value: &serde_json::Value) -> Option<i64> {
    if let Some(ms) = value.as_i64() {
        return Some(ms);
    }
    if let Some(s) = value.as_str() {
        return chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis());
    }
    None
}

/// Normalize one wire item into zero or more raw samples, dropping anything
/// malformed (missing timestamp, unrecognized unit, out-of-range index).
fn normalize_item(item: &WireItem) -> Vec<RawSample> {
    let Some(ts_value) = item.timestamp.as_ref() else {
        return Vec::new();
    };
    let Some(ts_ms) = parse_timestamp(ts_value) else {
        return Vec::new();
    };

    if let Some(values) = &item.values {
        return values
            .iter()
            .filter_map(|v| {
                let channel = match v.index {
                    1 => Channel::VibrationG,
                    2 => Channel::TemperatureC,
                    _ => return None,
                };
                Some(RawSample {
                    ts_ms,
                    channel,
                    value: v.value,
                })
            })
            .collect();
    }

    let (Some(unit), Some(value)) = (item.unit.as_deref(), item.value) else {
        return Vec::new();
    };
    match Channel::from_unit(unit) {
        Some(channel) => vec![RawSample { ts_ms, channel, value }],
        None => Vec::new(),
    }
}

/// HTTP fetch client for the vendor raw-sample API.
pub struct HttpSampleSource {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    system_id: String,
    timeout: Duration,
}

impl HttpSampleSource {
    pub fn new(api_base: String, api_key: String, system_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
            api_key,
            system_id,
            timeout: Duration::from_secs(30),
        }
    }

    async fn fetch_inner(
        &self,
        sensor_id: &str,
        from_ms: i64,
        to_ms: i64,
        limit: usize,
    ) -> Result<Vec<RawSample>, AdapterError> {
        let url = format!("{}/systems/{}/sensors/{}/samples", self.api_base, self.system_id, sensor_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("from", from_ms), ("to", to_ms), ("limit", limit as i64)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AdapterError::Fetch(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AdapterError::Fetch(format!("status {}", resp.status())));
        }

        let body: WireResponse = resp.json().await.map_err(|e| AdapterError::Fetch(e.to_string()))?;
        let items = match body {
            WireResponse::Array(items) => items,
            WireResponse::Wrapped { items } => items,
        };
        Ok(items.iter().flat_map(normalize_item).collect())
    }
}

#[async_trait]
impl SampleSource for HttpSampleSource {
    async fn fetch(&self, sensor_id: &str, from_ms: i64, to_ms: i64, limit: usize) -> Vec<RawSample> {
        match self.fetch_inner(sensor_id, from_ms, to_ms, limit).await {
            Ok(samples) => samples,
            Err(e) => {
                tracing::warn!(sensor_id, error = %e, "sample fetch failed, skipping sensor this cycle");
                Vec::new()
            }
        }
    }
}

/// Fetch raw samples for a set of sensors concurrently, capped by a
/// semaphore of `max_concurrency` in-flight requests (spec §5).
pub async fn fetch_all(
    source: &(dyn SampleSource),
    sensor_ids: &[String],
    from_ms: i64,
    to_ms: i64,
    limit: usize,
    max_concurrency: usize,
) -> Vec<(String, Vec<RawSample>)> {
    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    let mut tasks = Vec::new();

    for sensor_id in sensor_ids {
        let sem = semaphore.clone();
        let sensor_id = sensor_id.clone();
        // SAFETY-free: we can't move `source` (a trait object reference)
        // into spawned tasks without 'static, so fetches run concurrently
        // via a join set over futures borrowing `source` for this scope.
        tasks.push(async move {
            let _permit = sem.acquire_owned().await.expect("semaphore closed");
            let samples = source.fetch(&sensor_id, from_ms, to_ms, limit).await;
            (sensor_id, samples)
        });
    }

    futures::future::join_all(tasks).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_indexed_values_by_channel() {
        let item = WireItem {
            timestamp: Some(serde_json::json!(1_700_000_000_000i64)),
            unit: None,
            value: None,
            values: Some(vec![
                IndexedValue { index: 1, value: 0.5 },
                IndexedValue { index: 2, value: 42.0 },
                IndexedValue { index: 9, value: 1.0 },
            ]),
        };
        let samples = normalize_item(&item);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].channel, Channel::VibrationG);
        assert_eq!(samples[1].channel, Channel::TemperatureC);
    }

    #[test]
    fn normalizes_unit_labeled_scalar_reading() {
        let item = WireItem {
            timestamp: Some(serde_json::json!(1_700_000_000_000i64)),
            unit: Some("°C".to_string()),
            value: Some(55.0),
            values: None,
        };
        let samples = normalize_item(&item);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].channel, Channel::TemperatureC);
    }

    #[test]
    fn missing_timestamp_drops_record_silently() {
        let item = WireItem {
            timestamp: None,
            unit: Some("G".to_string()),
            value: Some(0.5),
            values: None,
        };
        assert!(normalize_item(&item).is_empty());
    }

    #[test]
    fn unrecognized_unit_drops_record_silently() {
        let item = WireItem {
            timestamp: Some(serde_json::json!(1_700_000_000_000i64)),
            unit: Some("Hz".to_string()),
            value: Some(1.0),
            values: None,
        };
        assert!(normalize_item(&item).is_empty());
    }
}
