//! Engine Driver (C9)
//!
//! Per-sensor pipeline orchestration: assemble raw history, resample,
//! run C3-C6, fuse, score health, then publish the latest row and scan for
//! new daily-top events. Grounded on `pipeline::coordinator`'s phase
//! structure — each phase is a plain function call, no hidden state beyond
//! what's threaded through explicitly.

use std::collections::HashMap;

use chrono::TimeZone;

use crate::config::EngineConfig;
use crate::domain::{
    AnalyzerTag, DiagnosticEvent, IntervalRow, RawSample, SensorProfile, Status,
};
use crate::engine::analyzers::{baseline, gradient, rcf, skf};
use crate::engine::fuse::{self, ChannelStatuses, ChannelStreak};
use crate::engine::{health, resample, EngineError};

/// Per-sensor rolling state carried across poll cycles: one set of debounce
/// streaks and known-event dedup per parallel event log (§4.9, §6) — the
/// ambient-compensated log and the raw, uncompensated log are independent
/// pipelines with independent persistence state.
#[derive(Default)]
pub struct SensorState {
    pub compensated: ChannelDebounceState,
    pub raw: ChannelDebounceState,
}

/// Debounce streaks and daily-event dedup for one event log.
#[derive(Default)]
pub struct ChannelDebounceState {
    pub skf_streak: ChannelStreak,
    pub siemens_streak: ChannelStreak,
    pub aws_streak: ChannelStreak,
    pub rcf_streak: ChannelStreak,
    pub known_events: std::collections::HashSet<(String, chrono::NaiveDate)>,
}

/// Identity and profile for one bearing sensor.
pub struct SensorContext<'a> {
    pub sensor_id: &'a str,
    pub alias: &'a str,
}

/// Run C2 through C8 for one sensor's raw history, given the line-wide
/// vibration average already computed by the caller and an optional hall
/// ambient-temperature series aligned by resampled interval.
pub fn run_pipeline(
    ctx: &SensorContext,
    raw_history: &[RawSample],
    hall_temps: Option<&HashMap<i64, f64>>,
    avg_line_vibration: &HashMap<i64, f64>,
    state: &mut ChannelDebounceState,
    cfg: &EngineConfig,
) -> Result<Vec<IntervalRow>, EngineError> {
    let profile = SensorProfile::detect(ctx.alias, &cfg.heavy_impact_keywords);
    let mut rows = resample::resample(raw_history, cfg)?;

    // Rolling context threaded across the row sequence.
    let mut baseline_history: Vec<f64> = Vec::new();
    let mut gradient_history: Vec<f64> = Vec::new();
    let mut productive_vib: Vec<f64> = Vec::new();
    let mut hi_history: Vec<Option<f64>> = Vec::new();

    // First pass: crest factor, ambient compensation, gradient, baseline
    // windows, and feature collection for the isolation forest.
    for row in rows.iter_mut() {
        row.crest_factor = skf::crest_factor(row.vib_max, row.vib_rms, row.is_production, cfg.idle_floor_g);

        let hall_temp = hall_temps.and_then(|m| m.get(&row.bucket_start_ms).copied());
        row.temp_compensated = gradient::compensate(row.temp_mean, hall_temp);
        gradient_history.push(row.temp_compensated);

        let window_start = gradient_history
            .len()
            .saturating_sub(cfg.gradient.window_intervals as usize);
        let smoothed = gradient::smoothed_gradient(&gradient_history[window_start..], cfg.bucket_minutes);
        let lag_idx = gradient_history.len() as i64 - 1 - cfg.gradient.window_intervals;
        let discrete = if lag_idx >= 0 {
            Some(gradient::discrete_gradient(
                row.temp_compensated,
                gradient_history[lag_idx as usize],
                cfg.gradient.window_intervals,
                cfg.bucket_minutes,
            ))
        } else {
            None
        };
        row.temp_gradient_final = gradient::final_gradient(smoothed, discrete);

        if let Some(v) = baseline::productive_sample(row.vib_rms, row.is_production, cfg.idle_floor_g) {
            productive_vib.push(v);
        }
        baseline_history.push(row.vib_rms);

        row.avg_line_vibration = avg_line_vibration
            .get(&row.bucket_start_ms)
            .copied()
            .unwrap_or(row.vib_rms);
    }

    // Isolation forest: fit once per cycle on this sensor's productive rows.
    let productive_feature_rows: Vec<rcf::Features> = rows
        .iter()
        .filter(|r| r.is_production && !r.is_rundown)
        .map(|r| rcf::features(r.vib_rms, r.temp_mean, r.crest_factor, r.temp_gradient_final, r.avg_line_vibration))
        .collect();
    let forest = if productive_feature_rows.len() >= cfg.rcf.min_rows {
        Some(rcf::IsolationForest::fit(&productive_feature_rows, &cfg.rcf))
    } else {
        None
    };
    let forest_scores: Option<Vec<f64>> = forest.as_ref().map(|f| {
        productive_feature_rows
            .iter()
            .map(|row| f.score(row))
            .collect()
    });
    let (warn_threshold, crit_threshold) = match &forest_scores {
        Some(scores) => (
            rcf::percentile(scores, cfg.rcf.warn_percentile),
            rcf::percentile(scores, cfg.rcf.crit_percentile),
        ),
        None => (0.0, 0.0),
    };

    // Second pass: per-interval analyzer classification, fusion, health.
    let baseline_window_rows = cfg.baseline_window_days as usize * (24 * 60 / cfg.bucket_minutes as usize);
    let mut productive_so_far: Vec<f64> = Vec::new();
    let mut forest_idx = 0usize;
    for (i, row) in rows.iter_mut().enumerate() {
        row.skf_status = skf::classify(
            row.crest_factor,
            row.is_break,
            !row.is_production,
            row.is_warmup,
            profile,
            &cfg.skf,
        );

        let window_start = i.saturating_sub(cfg.steady_window.saturating_sub(1));
        let local_window = &baseline_history[window_start..=i];
        let steady = baseline::is_steady_state(local_window, cfg.steady_cv_threshold);
        row.is_steady_state = steady;

        if baseline::productive_sample(row.vib_rms, row.is_production, cfg.idle_floor_g).is_some() {
            productive_so_far.push(row.vib_rms);
        }
        let window_start = productive_so_far.len().saturating_sub(baseline_window_rows);
        let (mean, std) = baseline::rolling_mean_std(&productive_so_far[window_start..]);
        let bands = baseline::bands(mean, std);
        row.baseline_7d = mean;
        row.baseline_7d_std = std;
        row.band_warning_lower = bands.warning_lower;
        row.band_warning_upper = bands.warning_upper;
        row.band_critical_lower = bands.critical_lower;
        row.band_critical_upper = bands.critical_upper;
        row.baseline_deviation_pct = baseline::deviation_pct(row.vib_rms, mean);
        row.siemens_status = baseline::classify_interval(row.vib_rms, row.is_production, row.is_warmup, steady, &bands);

        let gated_grad = gradient::gate(
            row.temp_gradient_final,
            row.temp_mean,
            row.is_production,
            row.is_warmup,
            row.is_break,
            &cfg.gradient,
        );
        row.aws_status = gradient::classify(gated_grad, row.temp_mean, row.is_break, row.is_production, &cfg.gradient);

        if row.is_production && !row.is_rundown {
            match &forest_scores {
                Some(scores) => {
                    let score = scores[forest_idx];
                    row.rcf_score = score;
                    let gated = rcf::floor_gate(row.vib_rms, &productive_vib, row.is_rundown, cfg.rcf.vib_floor_ratio);
                    row.rcf_status = rcf::classify(score, row.is_production, gated, warn_threshold, crit_threshold);
                    forest_idx += 1;
                }
                // Forest not yet fit (fewer than `rcf.min_rows` productive
                // rows seen): no verdict to give, not a false alarm.
                None => row.rcf_status = Status::Idle,
            }
        } else {
            row.rcf_status = Status::Idle;
        }

        let extreme_fire = gradient::is_extreme_fire(row.temp_gradient_final, row.temp_mean, &cfg.gradient);
        row.skf_status = fuse::debounce_channel(row.skf_status, &mut state.skf_streak, profile, extreme_fire, &cfg.persistence);
        row.siemens_status = fuse::debounce_channel(row.siemens_status, &mut state.siemens_streak, profile, extreme_fire, &cfg.persistence);
        row.aws_status = fuse::debounce_channel(row.aws_status, &mut state.aws_streak, profile, extreme_fire, &cfg.persistence);
        row.rcf_status = fuse::debounce_channel(row.rcf_status, &mut state.rcf_streak, profile, extreme_fire, &cfg.persistence);

        let fused = fuse::fuse(&ChannelStatuses {
            skf: row.skf_status,
            siemens: row.siemens_status,
            aws: row.aws_status,
            rcf: row.rcf_status,
        });
        row.final_verdict = fused.final_verdict;
        row.max_priority = fused.max_priority;
        row.alarm_source = fused.alarm_source;

        let seizure = health::is_seizure(row.vib_rms, row.temp_gradient_final);
        let scores = health::SubScores {
            h_vib: health::h_vib(row.baseline_deviation_pct, seizure),
            h_grad: health::h_grad(gated_grad, row.is_warmup),
            h_abs_temp: health::h_abs_temp(row.temp_mean),
            h_iso: health::h_iso(row.vib_rms),
            h_cf: health::h_cf(row.crest_factor, cfg.health.cf_critical),
            h_rcf: health::h_rcf(row.rcf_score),
        };
        let hi = health::health_index(&scores, &cfg.health, row.temp_mean, gated_grad, seizure, row.is_production);
        row.health_index = hi;

        let lagged_idx = i as i64 - crate::config::defaults::HI_TREND_LOOKBACK_INTERVALS;
        let lagged_hi = if lagged_idx >= 0 {
            hi_history[lagged_idx as usize]
        } else {
            None
        };
        row.hi_trend = health::hi_trend(hi, lagged_hi);

        if let Some(h) = hi {
            row.failure_probability = health::failure_probability(h, row.hi_trend, row.is_production);
        } else {
            row.failure_probability = None;
        }
        row.risk_level = health::risk_bucket(row.failure_probability);

        if let Some(h) = hi {
            let hourly_idx = i as i64 - (60 / cfg.bucket_minutes);
            if hourly_idx >= 0 {
                if let Some(Some(prev_hi)) = hi_history.get(hourly_idx as usize) {
                    let rate = h - prev_hi;
                    row.rul_hours = health::rul_hours(
                        h,
                        rate,
                        crate::config::defaults::HI_FLOOR_FOR_RUL,
                        crate::config::defaults::RUL_MAX_HOURS,
                    );
                }
            }
        }

        hi_history.push(hi);
    }

    Ok(rows)
}

/// Pick, for each day represented in the result, the single row with the
/// highest `max_priority` (if `>= 3`), dedupe against already-known
/// `(sensor, day)` pairs, and return the newly discovered events.
pub fn extract_daily_top_events(
    ctx: &SensorContext,
    rows: &[IntervalRow],
    state: &mut ChannelDebounceState,
    tz: chrono_tz::Tz,
) -> Vec<DiagnosticEvent> {
    let mut best_per_day: HashMap<chrono::NaiveDate, &IntervalRow> = HashMap::new();

    for row in rows {
        if row.max_priority < 3 {
            continue;
        }
        let utc = chrono::Utc.timestamp_millis_opt(row.bucket_start_ms).single();
        let Some(utc) = utc else { continue };
        let local_date = utc.with_timezone(&tz).date_naive();
        best_per_day
            .entry(local_date)
            .and_modify(|existing| {
                if row.max_priority > existing.max_priority {
                    *existing = row;
                }
            })
            .or_insert(row);
    }

    let mut events = Vec::new();
    for (day, row) in best_per_day {
        let key = (ctx.sensor_id.to_string(), day);
        if state.known_events.contains(&key) {
            continue;
        }
        state.known_events.insert(key);
        let timestamp = chrono::Utc
            .timestamp_millis_opt(row.bucket_start_ms)
            .single()
            .unwrap_or_else(chrono::Utc::now);
        events.push(DiagnosticEvent {
            sensor_id: ctx.sensor_id.to_string(),
            alias: ctx.alias.to_string(),
            timestamp,
            event_type: row.final_verdict,
            msg: format!("{} triggered by {}", row.final_verdict, row.alarm_source),
            vib_rms: row.vib_rms,
            temp_mean: row.temp_mean,
            temp_gradient: row.temp_gradient_final,
        });
    }
    events
}

/// Compute the line-wide average vibration across sibling sensors for each
/// shared bucket timestamp, to be injected before C6 runs.
pub fn line_wide_average(all_resampled: &[Vec<IntervalRow>]) -> HashMap<i64, f64> {
    let mut sums: HashMap<i64, (f64, u32)> = HashMap::new();
    for rows in all_resampled {
        for row in rows {
            let entry = sums.entry(row.bucket_start_ms).or_insert((0.0, 0));
            entry.0 += row.vib_rms;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(ts, (sum, count))| (ts, sum / count as f64))
        .collect()
}

/// Which analyzer tag corresponds to which status column, used when
/// building diagnostics messages outside the fuser itself.
pub fn tag_for_column(column: &str) -> Option<AnalyzerTag> {
    match column {
        "skf_status" => Some(AnalyzerTag::Skf),
        "siemens_status" => Some(AnalyzerTag::Siemens),
        "aws_status" => Some(AnalyzerTag::Aws),
        "rcf_status" => Some(AnalyzerTag::Rcf),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Channel;

    fn vib(ts_ms: i64, value: f64) -> RawSample {
        RawSample {
            ts_ms,
            channel: Channel::VibrationG,
            value,
        }
    }

    fn temp(ts_ms: i64, value: f64) -> RawSample {
        RawSample {
            ts_ms,
            channel: Channel::TemperatureC,
            value,
        }
    }

    #[test]
    fn clean_operation_scenario_has_no_events_and_monitoring_verdict() {
        let cfg = EngineConfig::default();
        let bucket_ms = cfg.bucket_minutes * 60_000;
        let mut samples = Vec::new();
        for i in 0..200 {
            samples.push(vib(i * bucket_ms, 0.8));
            samples.push(temp(i * bucket_ms, 42.0));
        }
        let ctx = SensorContext {
            sensor_id: "S1",
            alias: "Main Spindle Bearing",
        };
        let mut state = ChannelDebounceState::default();
        let empty_hall = HashMap::new();
        let avg_line: HashMap<i64, f64> = samples
            .iter()
            .filter(|s| matches!(s.channel, Channel::VibrationG))
            .map(|s| (resample_bucket(s.ts_ms, bucket_ms), 0.8))
            .collect();
        let rows = run_pipeline(&ctx, &samples, Some(&empty_hall), &avg_line, &mut state, &cfg).unwrap();
        let productive: Vec<_> = rows.iter().filter(|r| r.is_production && !r.is_warmup).collect();
        assert!(!productive.is_empty());
        for row in &productive {
            assert_eq!(row.final_verdict, Status::Monitoring, "row at {}", row.bucket_start_ms);
        }
    }

    fn resample_bucket(ts_ms: i64, bucket_ms: i64) -> i64 {
        (ts_ms.div_euclid(bucket_ms)) * bucket_ms
    }
}
