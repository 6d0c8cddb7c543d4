//! Resampler & Scheduler Classifier (C2)
//!
//! Splits raw samples into vibration/temperature channels, aggregates them
//! onto a fixed 5-minute grid, and derives the behavioral scheduling flags
//! that every downstream analyzer gates on. No wall-clock calendar is
//! consulted anywhere in this module — "productive" is purely a function of
//! observed vibration.

use crate::config::EngineConfig;
use crate::domain::{Channel, IntervalRow, RawSample};
use crate::engine::EngineError;

/// Bucket a timestamp (ms since epoch) down to its 5-minute grid start.
fn bucket_start_ms(ts_ms: i64, bucket_minutes: i64) -> i64 {
    let bucket_ms = bucket_minutes * 60_000;
    (ts_ms.div_euclid(bucket_ms)) * bucket_ms
}

struct RawAggregate {
    vib: Vec<f64>,
    temp: Vec<f64>,
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

fn std_dev(xs: &[f64], mean_val: f64) -> f64 {
    if xs.len() < 2 {
        0.0
    } else {
        let var = xs.iter().map(|x| (x - mean_val).powi(2)).sum::<f64>() / xs.len() as f64;
        var.sqrt()
    }
}

fn rms(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        (xs.iter().map(|x| x * x).sum::<f64>() / xs.len() as f64).sqrt()
    }
}

/// Aggregate raw samples for one sensor onto the configured bucket grid.
/// Does not yet apply gap-fill or scheduling — see [`resample`].
fn aggregate_buckets(samples: &[RawSample], bucket_minutes: i64) -> Vec<IntervalRow> {
    use std::collections::BTreeMap;

    let mut buckets: BTreeMap<i64, RawAggregate> = BTreeMap::new();
    for s in samples {
        let start = bucket_start_ms(s.ts_ms, bucket_minutes);
        let entry = buckets.entry(start).or_insert_with(|| RawAggregate {
            vib: Vec::new(),
            temp: Vec::new(),
        });
        match s.channel {
            Channel::VibrationG => entry.vib.push(s.value),
            Channel::TemperatureC => entry.temp.push(s.value),
        }
    }

    buckets
        .into_iter()
        .map(|(start, agg)| {
            let mut row = IntervalRow::new(start);
            if !agg.vib.is_empty() {
                let m = mean(&agg.vib);
                row.vib_mean = m;
                row.vib_std = std_dev(&agg.vib, m);
                row.vib_max = agg.vib.iter().cloned().fold(f64::MIN, f64::max);
                row.vib_rms = rms(&agg.vib);
                row.vib_count = agg.vib.len() as u32;
            }
            if !agg.temp.is_empty() {
                row.temp_mean = mean(&agg.temp);
                row.temp_max = agg.temp.iter().cloned().fold(f64::MIN, f64::max);
                row.temp_min = agg.temp.iter().cloned().fold(f64::MAX, f64::min);
                row.has_temp = true;
            }
            row
        })
        .collect()
}

/// Forward-fill `vib_*`/`temp_*` columns across gaps of up to
/// `gap_fill_intervals`, then drop rows where both channels are still
/// missing. Vibration gaps that survive fill collapse to 0.
fn gap_fill(mut rows: Vec<IntervalRow>, gap_fill_intervals: u32) -> Vec<IntervalRow> {
    let mut last_vib: Option<(f64, f64, f64, f64, u32)> = None;
    let mut vib_gap = 0u32;
    let mut last_temp: Option<(f64, f64, f64)> = None;
    let mut temp_gap = 0u32;

    for row in &mut rows {
        let had_vib = row.vib_count > 0;
        let had_temp = row.has_temp;

        if had_vib {
            last_vib = Some((row.vib_max, row.vib_mean, row.vib_std, row.vib_rms, row.vib_count));
            vib_gap = 0;
        } else if let Some((max, m, std, r, cnt)) = last_vib {
            if vib_gap < gap_fill_intervals {
                row.vib_max = max;
                row.vib_mean = m;
                row.vib_std = std;
                row.vib_rms = r;
                row.vib_count = cnt;
                vib_gap += 1;
            }
        }

        if had_temp {
            last_temp = Some((row.temp_mean, row.temp_max, row.temp_min));
            row.has_temp = true;
            temp_gap = 0;
        } else if let Some((m, max, min)) = last_temp {
            if temp_gap < gap_fill_intervals {
                row.temp_mean = m;
                row.temp_max = max;
                row.temp_min = min;
                row.has_temp = true;
                temp_gap += 1;
            }
        }
    }

    rows.retain(|row| row.vib_count > 0 || row.has_temp);
    for row in &mut rows {
        if row.vib_count == 0 {
            row.vib_max = 0.0;
            row.vib_mean = 0.0;
            row.vib_std = 0.0;
            row.vib_rms = 0.0;
        }
    }
    rows
}

/// Apply the behavioral scheduling state machine in a single forward pass.
/// No wall-clock calendar is used; every flag is derived from
/// `is_production_raw` transitions.
fn apply_scheduling(rows: &mut [IntervalRow], cfg: &EngineConfig) {
    let mut rundown_remaining = 0u32;
    let mut warmup_remaining = 0u32;
    let mut prev_production_raw = false;
    let mut prev_production = false;

    for row in rows.iter_mut() {
        row.is_production_raw = row.vib_rms > cfg.idle_floor_g;

        if prev_production_raw && !row.is_production_raw {
            rundown_remaining = cfg.rundown_intervals;
        }
        row.is_rundown = rundown_remaining > 0;
        if rundown_remaining > 0 {
            rundown_remaining -= 1;
        }

        row.is_production = row.is_production_raw || row.is_rundown;
        row.is_break = !row.is_production;

        if !prev_production && row.is_production {
            warmup_remaining = cfg.warmup_intervals;
        }
        row.is_warmup = row.is_production && warmup_remaining > 0;
        if row.is_production && warmup_remaining > 0 {
            warmup_remaining -= 1;
        }

        prev_production_raw = row.is_production_raw;
        prev_production = row.is_production;
    }
}

/// Resample a sensor's raw sample history into a gap-filled, scheduled
/// interval grid. Rows come back oldest-first.
///
/// Returns `Err(EngineError::MalformedSample)` if any raw sample carries a
/// non-finite value (NaN/infinite) — an upstream acquisition defect, not a
/// condition an analyzer should silently absorb.
pub fn resample(samples: &[RawSample], cfg: &EngineConfig) -> Result<Vec<IntervalRow>, EngineError> {
    if let Some(bad) = samples.iter().find(|s| !s.value.is_finite()) {
        return Err(EngineError::MalformedSample(format!(
            "non-finite value {} on channel {:?} at ts {}",
            bad.value, bad.channel, bad.ts_ms
        )));
    }
    let buckets = aggregate_buckets(samples, cfg.bucket_minutes);
    let mut rows = gap_fill(buckets, cfg.gap_fill_intervals);
    apply_scheduling(&mut rows, cfg);
    Ok(rows)
}
