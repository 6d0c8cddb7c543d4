//! Engine configuration.
//!
//! Provides the immutable `EngineConfig` value loaded from TOML, replacing
//! the module-level thresholds the source reassigns from its driver (spec
//! §9 "Global mutable state"). All rolling windows, thresholds, and profile
//! overrides live here and are passed into the analyzer pipeline by
//! reference; nothing in `engine::` mutates shared config at runtime.
//!
//! ## Loading order
//!
//! 1. `ENGINE_CONFIG` environment variable (path to TOML file)
//! 2. `engine_config.toml` in the current working directory
//! 3. Built-in defaults (matching the constants in `defaults`)
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! config::init(EngineConfig::load());
//! let retention = config::get().retention_days;
//! ```

pub mod defaults;

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Global engine configuration, initialized once at startup.
static ENGINE_CONFIG: OnceLock<EngineConfig> = OnceLock::new();

/// Initialize the global engine configuration.
///
/// Must be called exactly once before any calls to `get()`.
pub fn init(config: EngineConfig) {
    if ENGINE_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once — ignoring");
    }
}

/// Get a reference to the global engine configuration.
///
/// Panics if `init()` has not been called. This is by design — a missing
/// config is a fatal startup error, not a recoverable condition.
pub fn get() -> &'static EngineConfig {
    ENGINE_CONFIG
        .get()
        .expect("config::get() called before config::init() — this is a startup bug")
}

/// Check whether the config has been initialized. Useful for tests.
pub fn is_initialized() -> bool {
    ENGINE_CONFIG.get().is_some()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkfThresholds {
    pub warn_standard: f64,
    pub crit_standard: f64,
    pub warn_heavy: f64,
    pub crit_heavy: f64,
    pub floor: f64,
}

impl Default for SkfThresholds {
    fn default() -> Self {
        Self {
            warn_standard: defaults::SKF_WARN_STANDARD,
            crit_standard: defaults::SKF_CRIT_STANDARD,
            warn_heavy: defaults::SKF_WARN_HEAVY,
            crit_heavy: defaults::SKF_CRIT_HEAVY,
            floor: defaults::SKF_FLOOR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientThresholds {
    pub monitoring_ceiling: f64,
    pub plan_service_ceiling: f64,
    pub fire_gradient: f64,
    pub fire_temp: f64,
    pub window_intervals: i64,
}

impl Default for GradientThresholds {
    fn default() -> Self {
        Self {
            monitoring_ceiling: defaults::GRADIENT_MONITORING_CEILING,
            plan_service_ceiling: defaults::GRADIENT_PLAN_SERVICE_CEILING,
            fire_gradient: defaults::GRADIENT_FIRE_THRESHOLD,
            fire_temp: defaults::FIRE_TEMP_THRESHOLD,
            window_intervals: defaults::GRADIENT_WINDOW_INTERVALS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RcfConfig {
    pub min_rows: usize,
    pub n_trees: usize,
    pub max_sample: usize,
    pub seed: u64,
    pub warn_percentile: f64,
    pub crit_percentile: f64,
    pub vib_floor_ratio: f64,
}

impl Default for RcfConfig {
    fn default() -> Self {
        Self {
            min_rows: defaults::RCF_MIN_ROWS,
            n_trees: defaults::RCF_N_TREES,
            max_sample: defaults::RCF_MAX_SAMPLE,
            seed: defaults::RCF_SEED,
            warn_percentile: defaults::RCF_WARN_PERCENTILE,
            crit_percentile: defaults::RCF_CRIT_PERCENTILE,
            vib_floor_ratio: defaults::RCF_VIB_FLOOR_RATIO,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub fire: u32,
    pub alarm_standard: u32,
    pub alarm_heavy: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            fire: defaults::FIRE_PERSISTENCE,
            alarm_standard: defaults::ALARM_PERSISTENCE_STANDARD,
            alarm_heavy: defaults::ALARM_PERSISTENCE_HEAVY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthWeights {
    pub vib: f64,
    pub iso: f64,
    pub grad: f64,
    pub abs_temp: f64,
    pub cf: f64,
    pub rcf: f64,
    pub cf_critical: f64,
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            vib: defaults::HEALTH_WEIGHT_VIB,
            iso: defaults::HEALTH_WEIGHT_ISO,
            grad: defaults::HEALTH_WEIGHT_GRAD,
            abs_temp: defaults::HEALTH_WEIGHT_ABS_TEMP,
            cf: defaults::HEALTH_WEIGHT_CF,
            rcf: defaults::HEALTH_WEIGHT_RCF,
            cf_critical: defaults::CF_CRITICAL,
        }
    }
}

impl HealthWeights {
    /// Sum of the six sub-score weights; should be 1.00.
    pub fn weight_sum(&self) -> f64 {
        self.vib + self.iso + self.grad + self.abs_temp + self.cf + self.rcf
    }
}

/// Immutable, per-call configuration for the analyzer pipeline.
///
/// Loaded once at startup and passed by reference into every pure analyzer
/// function — no runtime mutation of shared thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retention_days: u32,
    pub bucket_minutes: i64,
    pub idle_floor_g: f64,
    pub warmup_intervals: u32,
    pub rundown_intervals: u32,
    pub gap_fill_intervals: u32,
    pub steady_window: usize,
    pub steady_cv_threshold: f64,
    pub baseline_window_days: u32,
    pub skf: SkfThresholds,
    pub gradient: GradientThresholds,
    pub rcf: RcfConfig,
    pub persistence: PersistenceConfig,
    pub health: HealthWeights,
    pub heavy_impact_keywords: Vec<String>,
    pub hall_sensor_id: Option<String>,
    /// IANA timezone name used for the civil-date event-dedup key (spec §9
    /// re-architecture hint). Parsed into a `chrono_tz::Tz` on load.
    pub event_timezone: String,

    /// Keys explicitly present in the loaded TOML, for startup diagnostics
    /// only — never read by analyzer logic.
    #[serde(skip)]
    provenance: HashSet<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention_days: defaults::RETENTION_DAYS,
            bucket_minutes: defaults::BUCKET_MINUTES,
            idle_floor_g: defaults::IDLE_FLOOR_G,
            warmup_intervals: defaults::WARMUP_INTERVALS,
            rundown_intervals: defaults::RUNDOWN_INTERVALS,
            gap_fill_intervals: defaults::GAP_FILL_INTERVALS,
            steady_window: defaults::STEADY_WINDOW_INTERVALS,
            steady_cv_threshold: defaults::STEADY_CV_THRESHOLD,
            baseline_window_days: defaults::BASELINE_WINDOW_DAYS,
            skf: SkfThresholds::default(),
            gradient: GradientThresholds::default(),
            rcf: RcfConfig::default(),
            persistence: PersistenceConfig::default(),
            health: HealthWeights::default(),
            heavy_impact_keywords: defaults::default_heavy_impact_keywords(),
            hall_sensor_id: None,
            event_timezone: "Europe/Warsaw".to_string(),
            provenance: HashSet::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration following the documented search order, falling
    /// back to built-in defaults if nothing is found.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("ENGINE_CONFIG") {
            match Self::from_file(&path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "failed to load ENGINE_CONFIG, falling back");
                }
            }
        }
        if Path::new("engine_config.toml").exists() {
            match Self::from_file("engine_config.toml") {
                Ok(cfg) => return cfg,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to load ./engine_config.toml, falling back to defaults");
                }
            }
        }
        tracing::info!("no engine_config.toml found, using built-in defaults");
        Self::default()
    }

    fn from_file(path: &str) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Fatal-at-startup validation (spec §7.6): malformed weights refuse to
    /// start rather than silently producing a miscalibrated health index.
    pub fn validate(&self) -> anyhow::Result<()> {
        let sum = self.health.weight_sum();
        if (sum - 1.0).abs() > 1e-6 {
            anyhow::bail!("health index weights must sum to 1.00, got {sum}");
        }
        if self.event_timezone.parse::<chrono_tz::Tz>().is_err() {
            anyhow::bail!("invalid event_timezone: {}", self.event_timezone);
        }
        Ok(())
    }

    pub fn tz(&self) -> chrono_tz::Tz {
        self.event_timezone
            .parse()
            .unwrap_or(chrono_tz::Europe::Warsaw)
    }
}
