//! bearing-sentinel - condition-monitoring daemon
//!
//! Polls a fleet of vibration/temperature sensors on a fixed cadence,
//! runs the diagnostic engine per sensor, and atomically publishes a JSON
//! snapshot for a front-end to read.
//!
//! # Usage
//!
//! ```bash
//! BEARING_API_KEY=... cargo run --release -- \
//!     --api-base https://sensors.example.com/api \
//!     --system-id line-3 \
//!     --sensor-ids S1,S2,S3
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use bearing_sentinel::adapters::http::{fetch_all, HttpSampleSource, SampleSource};
use bearing_sentinel::adapters::parquet_store::{self, ArchiveRow};
use bearing_sentinel::adapters::{settings, snapshot, AdapterError};
use bearing_sentinel::config::EngineConfig;
use bearing_sentinel::domain::{RawSample, SnapshotDocument, SnapshotSensor, INACTIVE_STATUS};
use bearing_sentinel::engine::driver::{self, SensorContext, SensorState};
use bearing_sentinel::store::SampleStore;

#[derive(Parser, Debug)]
#[command(name = "bearing-monitor")]
#[command(about = "Condition-monitoring engine for rotating machinery bearings")]
#[command(version)]
struct CliArgs {
    /// Path to an EngineConfig TOML file (overrides ENGINE_CONFIG env var).
    #[arg(long)]
    config: Option<String>,

    /// Base URL of the vendor raw-sample API.
    #[arg(long)]
    api_base: String,

    /// Bearer token for the vendor API.
    #[arg(long, env = "BEARING_API_KEY")]
    api_key: String,

    /// System/line identifier passed to the vendor API.
    #[arg(long)]
    system_id: String,

    /// Comma-separated sensor ids to monitor.
    #[arg(long, value_delimiter = ',')]
    sensor_ids: Vec<String>,

    /// Sensor id of the hall ambient-temperature reference, if any.
    #[arg(long)]
    hall_sensor_id: Option<String>,

    /// Substring filter applied to sensor aliases before polling (empty = all).
    #[arg(long)]
    tag_filter: Option<String>,

    /// Polling cadence, in seconds.
    #[arg(long, default_value_t = 120)]
    poll_interval_secs: u64,

    /// Max in-flight sample-fetch requests.
    #[arg(long, default_value_t = 20)]
    max_concurrency: usize,

    /// Raw-sample retention horizon, in days.
    #[arg(long)]
    retention_days: Option<u32>,

    /// Where the sample store persists its sled database.
    #[arg(long, default_value = "./data/samples")]
    store_path: PathBuf,

    /// Where the atomic JSON snapshot is published.
    #[arg(long, default_value = "./data/snapshot.json")]
    snapshot_path: PathBuf,

    /// Path to the reloadable settings file.
    #[arg(long, default_value = "./data/settings.json")]
    settings_path: PathBuf,

    /// Path to the Parquet raw-sample archive.
    #[arg(long, default_value = "./data/archive.parquet")]
    parquet_path: PathBuf,

    /// Wipe the sample store on startup.
    #[arg(long)]
    reset_store: bool,
}

fn load_engine_config(args: &CliArgs) -> Result<EngineConfig> {
    if let Some(path) = &args.config {
        std::env::set_var("ENGINE_CONFIG", path);
    }
    let mut cfg = EngineConfig::load();
    if let Some(retention_days) = args.retention_days {
        cfg.retention_days = retention_days;
    }
    if let Some(hall) = &args.hall_sensor_id {
        cfg.hall_sensor_id = Some(hall.clone());
    }
    cfg.validate().context("invalid engine configuration")?;
    Ok(cfg)
}

/// Refuse to start rather than discover an unwritable output path mid-cycle:
/// create `path`'s parent directory if missing, then touch-and-remove a
/// probe file in it.
fn ensure_writable(path: &std::path::Path) -> Result<(), AdapterError> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
    std::fs::create_dir_all(parent)
        .map_err(|e| AdapterError::Config(format!("cannot create directory {}: {e}", parent.display())))?;
    let probe = parent.join(format!(".bearing-sentinel-writetest-{}", std::process::id()));
    std::fs::write(&probe, b"")
        .map_err(|e| AdapterError::Config(format!("{} is not writable: {e}", parent.display())))?;
    let _ = std::fs::remove_file(&probe);
    Ok(())
}

/// One sensor's outputs from both parallel pipelines (§4.9, §6), with the
/// active log already selected per `use_hall_compensation`.
struct SensorOutputs {
    active_rows: Vec<bearing_sentinel::domain::IntervalRow>,
    events: Vec<bearing_sentinel::domain::DiagnosticEvent>,
}

/// Run both the ambient-compensated and raw pipelines for one sensor and
/// pick the active log. Both logs are always computed and their debounce/
/// dedup state always advanced, regardless of which is selected — flipping
/// `use_hall_compensation` only changes which already-computed log is
/// exposed, it never triggers recomputation.
fn process_sensor(
    ctx: &SensorContext,
    history: &[RawSample],
    hall_temps: Option<&HashMap<i64, f64>>,
    avg_line_vibration: &HashMap<i64, f64>,
    state: &mut SensorState,
    cfg: &EngineConfig,
    tz: chrono_tz::Tz,
    use_hall_compensation: bool,
) -> Result<SensorOutputs> {
    let compensated_rows = driver::run_pipeline(ctx, history, hall_temps, avg_line_vibration, &mut state.compensated, cfg)?;
    let raw_rows = driver::run_pipeline(ctx, history, None, avg_line_vibration, &mut state.raw, cfg)?;

    let compensated_events = driver::extract_daily_top_events(ctx, &compensated_rows, &mut state.compensated, tz);
    let raw_events = driver::extract_daily_top_events(ctx, &raw_rows, &mut state.raw, tz);

    let (active_rows, events) = if use_hall_compensation {
        (compensated_rows, compensated_events)
    } else {
        (raw_rows, raw_events)
    };

    Ok(SensorOutputs { active_rows, events })
}

/// One-time blocking backfill over `retention_days` of vendor history,
/// performed before the steady poll loop starts whenever no sensor has any
/// prior samples on disk. Publishes `mining_progress` (0..100) as each
/// sensor finishes, then a final snapshot with `mining_progress: None` and
/// the events found during the backfill.
async fn mine_historical(
    args: &CliArgs,
    store: &SampleStore,
    source: &HttpSampleSource,
    sensor_states: &mut HashMap<String, SensorState>,
    cfg: &EngineConfig,
) -> Result<()> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let from_ms = now_ms - cfg.retention_days as i64 * 86_400_000;
    let tz = cfg.tz();
    let total = args.sensor_ids.len().max(1);
    let mut mined_events = Vec::new();

    info!(retention_days = cfg.retention_days, sensors = total, "mining historical events before entering the poll loop");

    for (i, sensor_id) in args.sensor_ids.iter().enumerate() {
        let samples = source.fetch(sensor_id, from_ms, now_ms, 100_000).await;
        if !samples.is_empty() {
            if let Err(e) = store.append(sensor_id, &samples) {
                tracing::error!(sensor_id, error = %e, "persistence failure while mining history");
            }
        }

        let history = store.since(sensor_id, from_ms);
        let ctx = SensorContext {
            sensor_id,
            alias: sensor_id,
        };
        let state = sensor_states.entry(sensor_id.clone()).or_default();
        // No cross-sensor hall alignment is available mid-backfill, so both
        // logs run uncompensated here (L2: hall_temp absent == hall_temp=0).
        let rows = driver::run_pipeline(&ctx, &history, None, &HashMap::new(), &mut state.compensated, cfg)?;
        let raw_rows = driver::run_pipeline(&ctx, &history, None, &HashMap::new(), &mut state.raw, cfg)?;
        mined_events.extend(driver::extract_daily_top_events(&ctx, &rows, &mut state.compensated, tz));
        driver::extract_daily_top_events(&ctx, &raw_rows, &mut state.raw, tz);

        let progress = (i + 1) as f64 / total as f64 * 100.0;
        let doc = SnapshotDocument {
            server_time: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            mining_progress: Some(progress),
            sensors: Vec::new(),
            events: Vec::new(),
        };
        snapshot::publish(&doc, &args.snapshot_path).context("snapshot publish failed during mining")?;
    }

    let doc = SnapshotDocument {
        server_time: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        mining_progress: None,
        sensors: Vec::new(),
        events: mined_events,
    };
    snapshot::publish(&doc, &args.snapshot_path).context("snapshot publish failed after mining")?;

    info!("historical mining complete, entering poll loop");
    Ok(())
}

/// One polling cycle: fetch deltas, run the engine per sensor, publish.
async fn run_cycle(
    args: &CliArgs,
    store: &SampleStore,
    source: &HttpSampleSource,
    sensor_states: &mut HashMap<String, SensorState>,
    cfg: &EngineConfig,
    settings: settings::Settings,
) -> Result<()> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let from_ms = args
        .sensor_ids
        .iter()
        .filter_map(|id| store.last_ts(id))
        .min()
        .unwrap_or(now_ms - cfg.retention_days as i64 * 86_400_000);

    let fetched = fetch_all(source, &args.sensor_ids, from_ms, now_ms, 10_000, args.max_concurrency).await;

    for (sensor_id, samples) in &fetched {
        if samples.is_empty() {
            continue;
        }
        if let Err(e) = store.append(sensor_id, samples) {
            tracing::error!(sensor_id, error = %e, "persistence failure, continuing from in-memory state");
        }
    }

    let retention_cutoff = now_ms - cfg.retention_days as i64 * 86_400_000;

    for sensor_id in &args.sensor_ids {
        match store.trim(sensor_id, retention_cutoff) {
            Ok(removed) if removed > 0 => {
                tracing::debug!(sensor_id, removed, "trimmed expired samples from sample store");
            }
            Ok(_) => {}
            Err(e) => tracing::error!(sensor_id, error = %e, "sample store trim failed"),
        }
    }

    if fetched.iter().any(|(_, samples)| !samples.is_empty()) {
        let mut archive = parquet_store::load(&args.parquet_path).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to read parquet archive, starting fresh");
            Vec::new()
        });
        for (sensor_id, samples) in &fetched {
            archive.extend(
                samples
                    .iter()
                    .map(|s| ArchiveRow::new(sensor_id.clone(), s.ts_ms, s.channel, s.value)),
            );
        }
        let archive = parquet_store::trim(archive, retention_cutoff);
        if let Err(e) = parquet_store::save(&args.parquet_path, &archive) {
            tracing::error!(error = %e, "failed to persist parquet archive");
        }
    }

    let mut all_resampled = Vec::new();
    let mut resampled_by_sensor = HashMap::new();
    for sensor_id in &args.sensor_ids {
        let history = store.since(sensor_id, retention_cutoff);
        let rows = bearing_sentinel::engine::resample::resample(&history, cfg)?;
        all_resampled.push(rows.clone());
        resampled_by_sensor.insert(sensor_id.clone(), rows);
    }
    let avg_line_vibration = driver::line_wide_average(&all_resampled);

    let tz = cfg.tz();
    let mut sensors_out = Vec::new();
    let mut events_out = Vec::new();

    for sensor_id in &args.sensor_ids {
        let alias = sensor_id.clone();
        if let Some(filter) = &args.tag_filter {
            if !alias.to_lowercase().contains(&filter.to_lowercase()) {
                continue;
            }
        }

        let history = store.since(sensor_id, retention_cutoff);
        let ctx = SensorContext {
            sensor_id,
            alias: &alias,
        };
        let state = sensor_states.entry(sensor_id.clone()).or_default();

        let hall_temps = cfg.hall_sensor_id.as_ref().and_then(|hall_id| {
            resampled_by_sensor.get(hall_id).map(|rows| {
                rows.iter()
                    .map(|r| (r.bucket_start_ms, r.temp_mean))
                    .collect::<HashMap<_, _>>()
            })
        });

        let outputs = process_sensor(
            &ctx,
            &history,
            hall_temps.as_ref(),
            &avg_line_vibration,
            state,
            cfg,
            tz,
            settings.use_hall_compensation,
        )?;
        events_out.extend(outputs.events);

        let rows = &outputs.active_rows;
        let status = match rows.last() {
            Some(row) => row.final_verdict.to_string(),
            None => INACTIVE_STATUS.to_string(),
        };
        sensors_out.push(SnapshotSensor {
            sn: sensor_id.clone(),
            alias,
            timestamp: rows.last().map(|r| r.bucket_start_ms).unwrap_or(now_ms),
            temp: rows.last().map(|r| r.temp_mean).unwrap_or(0.0),
            vib_rms: rows.last().map(|r| r.vib_rms).unwrap_or(0.0),
            health_index: rows.last().and_then(|r| r.health_index),
            failure_prob: rows.last().and_then(|r| r.failure_probability),
            status,
        });
    }

    let doc = SnapshotDocument {
        server_time: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        mining_progress: None,
        sensors: sensors_out,
        events: events_out,
    };
    snapshot::publish(&doc, &args.snapshot_path).context("snapshot publish failed")?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    if args.sensor_ids.is_empty() {
        anyhow::bail!("--sensor-ids must list at least one sensor");
    }

    let cfg = load_engine_config(&args)?;
    bearing_sentinel::config::init(cfg);
    let cfg = bearing_sentinel::config::get();

    if args.reset_store && args.store_path.exists() {
        warn!(path = %args.store_path.display(), "reset_store requested, removing sample store");
        std::fs::remove_dir_all(&args.store_path).context("failed to remove sample store")?;
    }

    ensure_writable(&args.snapshot_path).context("snapshot path is not usable")?;
    ensure_writable(&args.parquet_path).context("parquet archive path is not usable")?;

    let store = SampleStore::open(&args.store_path).context("failed to open sample store")?;
    let source = HttpSampleSource::new(args.api_base.clone(), args.api_key.clone(), args.system_id.clone());
    let mut sensor_states: HashMap<String, SensorState> = HashMap::new();

    info!(
        sensors = args.sensor_ids.len(),
        poll_interval_secs = args.poll_interval_secs,
        "bearing-monitor starting"
    );

    let never_mined = args.sensor_ids.iter().all(|id| store.last_ts(id).is_none());
    if never_mined {
        mine_historical(&args, &store, &source, &mut sensor_states, cfg)
            .await
            .context("historical mining failed")?;
    }

    loop {
        let loaded_settings = settings::load(&args.settings_path).unwrap_or_else(|e| {
            warn!(error = %e, "failed to load settings, using defaults");
            settings::Settings::default()
        });

        if let Err(e) = run_cycle(&args, &store, &source, &mut sensor_states, cfg, loaded_settings).await {
            tracing::error!(error = %e, "poll cycle failed");
        }

        tokio::time::sleep(Duration::from_secs(args.poll_interval_secs)).await;
    }
}
