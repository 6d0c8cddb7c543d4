//! System-wide default constants for the condition-monitoring engine.
//!
//! Centralises magic numbers scattered through `bearing_monitor.py` in the
//! source system. Grouped by subsystem for easy discovery.

// ============================================================================
// Retention & resampling
// ============================================================================

/// Default raw-sample retention horizon, in days (spec §9 OQ2 pins 60, not
/// the 120 seen in one variant of the source).
pub const RETENTION_DAYS: u32 = 60;

/// Aggregation bucket width, in minutes.
pub const BUCKET_MINUTES: i64 = 5;

/// Below this vibration RMS (g) an interval is not considered productive.
pub const IDLE_FLOOR_G: f64 = 0.1;

/// 15 min / 5 min bucket = 3 intervals of post-stop cooling kept "productive".
pub const RUNDOWN_INTERVALS: u32 = 3;

/// 60 min / 5 min bucket = 12 intervals of post-start leniency.
pub const WARMUP_INTERVALS: u32 = 12;

/// Forward-fill gap tolerance, in intervals (15 min).
pub const GAP_FILL_INTERVALS: u32 = 3;

// ============================================================================
// Adaptive baseline (C4)
// ============================================================================

/// Rolling baseline window, in days.
pub const BASELINE_WINDOW_DAYS: u32 = 30;

/// Local steady-state window, in intervals.
pub const STEADY_WINDOW_INTERVALS: usize = 6;

/// Local coefficient-of-variation ceiling for "steady state".
pub const STEADY_CV_THRESHOLD: f64 = 0.15;

// ============================================================================
// SKF crest-factor thresholds (C3)
// ============================================================================

pub const SKF_WARN_STANDARD: f64 = 5.0;
pub const SKF_CRIT_STANDARD: f64 = 6.0;
pub const SKF_WARN_HEAVY: f64 = 6.0;
pub const SKF_CRIT_HEAVY: f64 = 8.0;
/// Below this crest factor, the interval is never alarmed.
pub const SKF_FLOOR: f64 = 3.0;

// ============================================================================
// Thermal gradient (C5)
// ============================================================================

pub const GRADIENT_MONITORING_CEILING: f64 = 10.0;
pub const GRADIENT_PLAN_SERVICE_CEILING: f64 = 15.0;
pub const GRADIENT_FIRE_THRESHOLD: f64 = 30.0;
pub const FIRE_TEMP_THRESHOLD: f64 = 45.0;
/// Smoothed/discrete gradient window, in intervals (1 h at 5-min buckets).
pub const GRADIENT_WINDOW_INTERVALS: i64 = 12;

// ============================================================================
// Isolation forest (C6)
// ============================================================================

/// Minimum productive rows required to (re)fit the forest; below this the
/// analyzer stays `IDLE`.
pub const RCF_MIN_ROWS: usize = 500;
pub const RCF_N_TREES: usize = 100;
pub const RCF_MAX_SAMPLE: usize = 256;
pub const RCF_SEED: u64 = 0xB34_1119;
pub const RCF_WARN_PERCENTILE: f64 = 1.0;
pub const RCF_CRIT_PERCENTILE: f64 = 0.1;
/// Vibration-floor gate ratio against the productive-row median (spec §9 OQ3
/// notes the source doesn't calibrate this; it is fixed here as 0.8).
pub const RCF_VIB_FLOOR_RATIO: f64 = 0.8;

// ============================================================================
// Alarm persistence / debounce (C7)
// ============================================================================

pub const FIRE_PERSISTENCE: u32 = 1;
pub const ALARM_PERSISTENCE_STANDARD: u32 = 2;
pub const ALARM_PERSISTENCE_HEAVY: u32 = 5;

// ============================================================================
// Health index weights (C8)
// ============================================================================

pub const HEALTH_WEIGHT_VIB: f64 = 0.20;
pub const HEALTH_WEIGHT_ISO: f64 = 0.20;
pub const HEALTH_WEIGHT_GRAD: f64 = 0.20;
pub const HEALTH_WEIGHT_ABS_TEMP: f64 = 0.15;
pub const HEALTH_WEIGHT_CF: f64 = 0.10;
pub const HEALTH_WEIGHT_RCF: f64 = 0.15;

pub const CF_CRITICAL: f64 = 6.0;
pub const HI_TREND_LOOKBACK_INTERVALS: i64 = 24; // 2 h
pub const RUL_MAX_HOURS: f64 = 168.0;
pub const HI_FLOOR_FOR_RUL: f64 = 15.0;

// ============================================================================
// Engine driver (C9)
// ============================================================================

/// Heavy-impact alias keywords, verbatim from `bearing_monitor.py`.
pub fn default_heavy_impact_keywords() -> Vec<String> {
    ["QSS", "HUGG", "CHIPPER", "REBAK", "RĘBAK"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// ============================================================================
// Driver / polling loop
// ============================================================================

/// Default polling cadence, in seconds.
pub const POLL_INTERVAL_SECS: u64 = 120;

/// Default cap on in-flight raw-sample fetch requests.
pub const MAX_FETCH_CONCURRENCY: usize = 20;

/// Settings-file / cancellation poll granularity inside the wait phase.
pub const SETTINGS_POLL_SECS: u64 = 1;
