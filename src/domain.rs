//! Core data model for the condition-monitoring engine.
//!
//! These types are shared by the sample store, the analyzer pipeline, and
//! the external adapters. Aggregated rows and status columns are pure
//! functions of raw history plus sensor profile — nothing here owns
//! mutable shared state.

use serde::{Deserialize, Serialize};

/// Physical channel carried by a raw sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Channel {
    VibrationG,
    TemperatureC,
}

impl Channel {
    /// Normalize a unit string from the inbound HTTP feed into a channel.
    ///
    /// Units may arrive as `G, g, C, c, °C`; anything else is unrecognized.
    pub fn from_unit(unit: &str) -> Option<Self> {
        match unit {
            "G" | "g" => Some(Channel::VibrationG),
            "C" | "c" | "°C" => Some(Channel::TemperatureC),
            _ => None,
        }
    }
}

/// A single raw `(timestamp, sensor, channel, value)` tuple as it arrives
/// from the external fetch adapter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RawSample {
    /// Milliseconds since the Unix epoch.
    pub ts_ms: i64,
    pub channel: Channel,
    pub value: f64,
}

/// Machine profile selected from the sensor's human alias.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SensorProfile {
    #[default]
    Standard,
    HeavyImpact,
}

impl SensorProfile {
    /// Case-insensitive substring match against the configured heavy-impact
    /// keyword set (`QSS`, `HUGG`, `CHIPPER`, `REBAK`, `RĘBAK` by default).
    pub fn detect(alias: &str, heavy_keywords: &[String]) -> Self {
        let alias_upper = alias.to_uppercase();
        if heavy_keywords
            .iter()
            .any(|kw| alias_upper.contains(&kw.to_uppercase()))
        {
            SensorProfile::HeavyImpact
        } else {
            SensorProfile::Standard
        }
    }
}

/// The ordinal diagnostic-status enum shared by all four analyzers and the
/// fused verdict. Only these five values are ever produced; the gaps in the
/// numeric priority mapping (see `priority`) are intentional.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Status {
    Idle,
    Monitoring,
    PlanService,
    CriticalAlarm,
    FireStop,
}

impl Status {
    /// Fixed priority lattice from spec §4.7. `IDLE`/`UNKNOWN` and
    /// `MONITORING` are quiet; priority 2 is reserved and never produced.
    pub fn priority(self) -> u8 {
        match self {
            Status::Idle => 0,
            Status::Monitoring => 1,
            Status::PlanService => 3,
            Status::CriticalAlarm => 4,
            Status::FireStop => 5,
        }
    }

    pub fn from_priority(p: u8) -> Self {
        match p {
            0 => Status::Idle,
            1 => Status::Monitoring,
            3 => Status::PlanService,
            4 => Status::CriticalAlarm,
            _ => Status::FireStop,
        }
    }

    /// Short display tag used in `alarm_source` (e.g. `SKF`, `AWS`).
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Idle => "IDLE",
            Status::Monitoring => "MONITORING",
            Status::PlanService => "PLAN_SERVICE",
            Status::CriticalAlarm => "CRITICAL_ALARM",
            Status::FireStop => "FIRE_STOP",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which analyzer channel produced a status, used to build `alarm_source`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AnalyzerTag {
    Skf,
    Siemens,
    Aws,
    Rcf,
}

impl AnalyzerTag {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalyzerTag::Skf => "SKF",
            AnalyzerTag::Siemens => "SIEMENS",
            AnalyzerTag::Aws => "AWS",
            AnalyzerTag::Rcf => "RCF",
        }
    }
}

/// Risk bucket derived from `failure_probability`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RiskBucket {
    Idle,
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskBucket::Idle => "IDLE",
            RiskBucket::Low => "LOW",
            RiskBucket::Moderate => "MODERATE",
            RiskBucket::High => "HIGH",
            RiskBucket::Critical => "CRITICAL",
        }
    }
}

/// One 5-minute aggregated interval row for one sensor.
///
/// Fields are populated in stages as the row passes through C2 → C3-C6 → C7
/// → C8; analyzer/health fields are `None`/default until that stage runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalRow {
    /// Bucket start, milliseconds since the Unix epoch.
    pub bucket_start_ms: i64,

    // Vibration aggregates (C2)
    pub vib_max: f64,
    pub vib_mean: f64,
    pub vib_std: f64,
    pub vib_rms: f64,
    pub vib_count: u32,

    // Temperature aggregates (C2)
    pub temp_mean: f64,
    pub temp_max: f64,
    pub temp_min: f64,
    pub has_temp: bool,

    // Scheduling flags (C2)
    pub is_production_raw: bool,
    pub is_rundown: bool,
    pub is_production: bool,
    pub is_break: bool,
    pub is_warmup: bool,

    // Analyzer-derived fields
    pub crest_factor: f64,
    pub baseline_7d: f64,
    pub baseline_7d_std: f64,
    pub band_warning_lower: f64,
    pub band_warning_upper: f64,
    pub band_critical_lower: f64,
    pub band_critical_upper: f64,
    pub baseline_deviation_pct: f64,
    pub is_steady_state: bool,
    pub temp_compensated: f64,
    pub temp_gradient_final: f64,
    pub rcf_score: f64,
    /// Line-wide vibration mean across sibling sensors in this cycle,
    /// injected by the driver before C6 runs.
    pub avg_line_vibration: f64,

    // Status columns
    pub skf_status: Status,
    pub siemens_status: Status,
    pub aws_status: Status,
    pub rcf_status: Status,
    pub final_verdict: Status,
    pub alarm_source: String,
    pub max_priority: u8,

    // Health
    pub health_index: Option<f64>,
    pub hi_trend: Option<f64>,
    pub failure_probability: Option<f64>,
    pub rul_hours: Option<f64>,
    pub risk_level: RiskBucket,
}

impl IntervalRow {
    /// A freshly aggregated row with every derived column at its zero/
    /// default value, ready for C3-C8 to fill in.
    pub fn new(bucket_start_ms: i64) -> Self {
        Self {
            bucket_start_ms,
            vib_max: 0.0,
            vib_mean: 0.0,
            vib_std: 0.0,
            vib_rms: 0.0,
            vib_count: 0,
            temp_mean: 0.0,
            temp_max: 0.0,
            temp_min: 0.0,
            has_temp: false,
            is_production_raw: false,
            is_rundown: false,
            is_production: false,
            is_break: true,
            is_warmup: false,
            crest_factor: 0.0,
            baseline_7d: 0.0,
            baseline_7d_std: 0.0,
            band_warning_lower: 0.0,
            band_warning_upper: 0.0,
            band_critical_lower: 0.0,
            band_critical_upper: 0.0,
            baseline_deviation_pct: 0.0,
            is_steady_state: false,
            temp_compensated: 0.0,
            temp_gradient_final: 0.0,
            rcf_score: 0.0,
            avg_line_vibration: 0.0,
            skf_status: Status::Idle,
            siemens_status: Status::Idle,
            aws_status: Status::Idle,
            rcf_status: Status::Idle,
            final_verdict: Status::Idle,
            alarm_source: "-".to_string(),
            max_priority: 0,
            health_index: None,
            hi_trend: None,
            failure_probability: None,
            rul_hours: None,
            risk_level: RiskBucket::Idle,
        }
    }
}

/// A daily-top diagnostic event emitted by the engine driver (C9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub sensor_id: String,
    pub alias: String,
    /// ISO-8601, UTC.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub event_type: Status,
    pub msg: String,
    pub vib_rms: f64,
    pub temp_mean: f64,
    pub temp_gradient: f64,
}

/// One row of the published live snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSensor {
    pub sn: String,
    pub alias: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub temp: f64,
    pub vib_rms: f64,
    pub health_index: Option<f64>,
    pub failure_prob: Option<f64>,
    pub status: String,
}

/// Top-level snapshot document, atomically published to disk (C10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub server_time: String,
    pub mining_progress: Option<f64>,
    pub sensors: Vec<SnapshotSensor>,
    pub events: Vec<DiagnosticEvent>,
}

/// Sentinel status for a sensor that has never produced a row yet, so the
/// UI alias table stays stable. Distinct from the analyzer-internal `IDLE`
/// — it never participates in fusion and never appears in the §4.7 enum.
pub const INACTIVE_STATUS: &str = "INAKTIV";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_unit_normalization() {
        assert_eq!(Channel::from_unit("G"), Some(Channel::VibrationG));
        assert_eq!(Channel::from_unit("g"), Some(Channel::VibrationG));
        assert_eq!(Channel::from_unit("C"), Some(Channel::TemperatureC));
        assert_eq!(Channel::from_unit("°C"), Some(Channel::TemperatureC));
        assert_eq!(Channel::from_unit("bogus"), None);
    }

    #[test]
    fn status_priority_has_reserved_gap() {
        assert_eq!(Status::Idle.priority(), 0);
        assert_eq!(Status::Monitoring.priority(), 1);
        assert_eq!(Status::PlanService.priority(), 3);
        assert_eq!(Status::CriticalAlarm.priority(), 4);
        assert_eq!(Status::FireStop.priority(), 5);
    }

    #[test]
    fn profile_detects_heavy_impact_case_insensitive() {
        let keywords = vec!["QSS".to_string(), "CHIPPER".to_string()];
        assert_eq!(
            SensorProfile::detect("qss-420", &keywords),
            SensorProfile::HeavyImpact
        );
        assert_eq!(
            SensorProfile::detect("Main Chipper Bearing", &keywords),
            SensorProfile::HeavyImpact
        );
        assert_eq!(
            SensorProfile::detect("Planer Feed Motor", &keywords),
            SensorProfile::Standard
        );
    }
}
