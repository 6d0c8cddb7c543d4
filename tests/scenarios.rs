//! End-to-end scenario tests for the diagnostic engine.
//!
//! Each test seeds a raw sample history, runs it through the real
//! resample -> analyze -> fuse -> health pipeline, and checks the
//! invariants/laws/scenarios the engine is contracted to satisfy.

use std::collections::HashMap;

use bearing_sentinel::config::EngineConfig;
use bearing_sentinel::domain::{Channel, RawSample, RiskBucket, Status};
use bearing_sentinel::engine::analyzers::skf;
use bearing_sentinel::engine::driver::{self, ChannelDebounceState, SensorContext};
use bearing_sentinel::engine::fuse::{self, ChannelStreak};
use bearing_sentinel::engine::resample;

const BUCKET_MS: i64 = 5 * 60_000;

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

fn cfg() -> EngineConfig {
    EngineConfig::default()
}

fn run(history: &[RawSample], alias: &str, cfg: &EngineConfig) -> Vec<bearing_sentinel::domain::IntervalRow> {
    let ctx = SensorContext {
        sensor_id: "S1",
        alias,
    };
    let mut state = ChannelDebounceState::default();
    driver::run_pipeline(&ctx, history, None, &HashMap::new(), &mut state, cfg).unwrap()
}

// S1 — Clean operation: constant vib=0.8g, temp=42C. Every productive row
// (including the warmup tail) should read MONITORING with a high HI.
#[test]
fn s1_clean_operation_is_monitoring_with_high_health() {
    let c = cfg();
    let hours = 2;
    let n = (hours * 60) / 5;
    let mut history = Vec::new();
    for i in 0..n {
        let ts = i as i64 * BUCKET_MS;
        history.push(vib(ts, 0.8));
        history.push(temp(ts, 42.0));
    }
    let rows = run(&history, "LINE-3-BRG-1", &c);
    assert!(!rows.is_empty());

    let productive: Vec<_> = rows.iter().filter(|r| r.is_production && !r.is_warmup).collect();
    assert!(!productive.is_empty(), "expected at least one post-warmup row");
    for row in &productive {
        assert_eq!(row.final_verdict, Status::Monitoring, "row at {} was {:?}", row.bucket_start_ms, row.final_verdict);
        assert_eq!(row.alarm_source, "-");
        let hi = row.health_index.expect("productive row must have a health index");
        assert!(hi >= 95.0, "HI was {hi}");
        let fp = row.failure_probability.expect("productive row must have a failure probability");
        assert!(fp <= 2.0, "failure_probability was {fp}");
    }

    let ctx = SensorContext {
        sensor_id: "S1",
        alias: "LINE-3-BRG-1",
    };
    let mut state = ChannelDebounceState::default();
    let events = driver::extract_daily_top_events(&ctx, &rows, &mut state, c.tz());
    assert!(events.is_empty(), "clean operation should raise no events");
}

// S2 — Textbook fire: temp ramps from 45C at +35C/h starting partway through
// a quiet history. Fire must eventually trip, and P6 must hold at that row.
#[test]
fn s2_textbook_fire_trips_fire_stop_and_satisfies_p6() {
    let c = cfg();
    let baseline_rows = 200;
    let ramp_rows = 40;
    let mut history = Vec::new();
    for i in 0..baseline_rows {
        let ts = i as i64 * BUCKET_MS;
        history.push(vib(ts, 0.5));
        history.push(temp(ts, 42.0));
    }
    for i in 0..ramp_rows {
        let ts = (baseline_rows + i) as i64 * BUCKET_MS;
        let t = 45.0 + i as f64 * (35.0 / 12.0);
        history.push(vib(ts, 0.5));
        history.push(temp(ts, t));
    }
    let rows = run(&history, "LINE-3-BRG-2", &c);

    let fire_row = rows.iter().find(|r| r.aws_status == Status::FireStop);
    let fire_row = fire_row.expect("expected a FIRE_STOP row once the gradient ramp runs long enough");

    // P6: a FIRE_STOP verdict implies a qualifying gradient/temp pair at some t' <= t.
    let qualifies = rows
        .iter()
        .take_while(|r| r.bucket_start_ms <= fire_row.bucket_start_ms)
        .any(|r| r.temp_gradient_final >= 15.0 && r.temp_mean >= 45.0)
        || (fire_row.temp_gradient_final >= 30.0 && fire_row.temp_mean >= 45.0);
    assert!(qualifies, "P6 violated: no qualifying interval found at or before the FIRE_STOP row");

    assert_eq!(fire_row.final_verdict, Status::FireStop);
    assert!(fire_row.alarm_source.contains("AWS"));

    let ctx = SensorContext {
        sensor_id: "S1",
        alias: "LINE-3-BRG-2",
    };
    let mut state = ChannelDebounceState::default();
    let events = driver::extract_daily_top_events(&ctx, &rows, &mut state, c.tz());
    assert!(!events.is_empty(), "a fire day should produce a diagnostic event");
}

// S3 — Seized shaft: vibration collapses below the idle floor while the
// bearing was already overheating, so the stop is briefly classified
// productive via run-down. HI must cap low and risk must read CRITICAL
// during that window.
#[test]
fn s3_seized_shaft_caps_health_and_raises_critical_risk() {
    let c = cfg();
    let mut history = Vec::new();
    let stop_at = 200;
    let ramp_start = stop_at - 6;

    for i in 0..ramp_start {
        let ts = i as i64 * BUCKET_MS;
        history.push(vib(ts, 0.6));
        history.push(temp(ts, 40.0));
    }
    for i in 0..6 {
        let ts = (ramp_start + i) as i64 * BUCKET_MS;
        let t = 40.0 + i as f64 * 5.0;
        history.push(vib(ts, 0.6));
        history.push(temp(ts, t));
    }
    // Seizure: vibration collapses below the idle floor, temperature holds
    // at its overheated plateau (70C) for the rundown window.
    for i in 0..4 {
        let ts = (stop_at + i) as i64 * BUCKET_MS;
        history.push(vib(ts, 0.005));
        history.push(temp(ts, 70.0));
    }

    let rows = run(&history, "LINE-3-BRG-3", &c);
    let rundown_rows: Vec<_> = rows
        .iter()
        .filter(|r| r.bucket_start_ms >= stop_at as i64 * BUCKET_MS && r.is_production)
        .collect();
    assert!(!rundown_rows.is_empty(), "expected the stop to remain productive through run-down");

    for row in &rundown_rows {
        let hi = row.health_index.expect("rundown rows are productive and must carry a health index");
        assert!(hi <= 15.0, "HI was {hi} at {}", row.bucket_start_ms);
        let fp = row.failure_probability.expect("rundown rows must carry a failure probability");
        assert!(fp >= 75.0, "failure_probability was {fp}");
        assert_eq!(row.risk_level, RiskBucket::Critical);
    }
}

// S6 — Ambient compensation: a constant +10C hall offset must not change
// the gradient or AWS verdicts once compensated (L2).
#[test]
fn s6_ambient_compensation_cancels_constant_hall_offset() {
    let c = cfg();
    let mut history = Vec::new();
    for i in 0..60 {
        let ts = i as i64 * BUCKET_MS;
        history.push(vib(ts, 0.6));
        history.push(temp(ts, 30.0 + (i as f64 * 0.2)));
    }

    let ctx = SensorContext {
        sensor_id: "S1",
        alias: "LINE-3-BRG-4",
    };

    let mut state_uncompensated = ChannelDebounceState::default();
    let rows_uncompensated = driver::run_pipeline(&ctx, &history, None, &HashMap::new(), &mut state_uncompensated, &c).unwrap();

    let hall_zero: HashMap<i64, f64> = rows_uncompensated.iter().map(|r| (r.bucket_start_ms, 0.0)).collect();
    let mut state_zero_hall = ChannelDebounceState::default();
    let rows_zero_hall = driver::run_pipeline(&ctx, &history, Some(&hall_zero), &HashMap::new(), &mut state_zero_hall, &c).unwrap();

    for (a, b) in rows_uncompensated.iter().zip(rows_zero_hall.iter()) {
        assert!((a.temp_compensated - b.temp_compensated).abs() < 1e-9);
        assert_eq!(a.aws_status, b.aws_status);
    }
}

// L1 — Resampling twice over the same raw history yields identical rows.
#[test]
fn l1_resample_is_idempotent() {
    let c = cfg();
    let mut history = Vec::new();
    for i in 0..30 {
        let ts = i as i64 * BUCKET_MS;
        history.push(vib(ts, 0.4 + (i % 3) as f64 * 0.05));
        history.push(temp(ts, 40.0));
    }
    let first = resample::resample(&history, &c).unwrap();
    let second = resample::resample(&history, &c).unwrap();
    let first_json = serde_json::to_string(&first).unwrap();
    let second_json = serde_json::to_string(&second).unwrap();
    assert_eq!(first_json, second_json);
}

// P1-P3, P5 — structural invariants checked across a mixed productive/idle
// history (includes a stop-start cycle so rundown/warmup both occur).
#[test]
fn p1_p2_p3_p5_hold_across_a_mixed_history() {
    let c = cfg();
    let mut history = Vec::new();
    for i in 0..20 {
        let ts = i as i64 * BUCKET_MS;
        history.push(vib(ts, 0.5));
        history.push(temp(ts, 40.0));
    }
    for i in 20..24 {
        let ts = i as i64 * BUCKET_MS;
        history.push(vib(ts, 0.01)); // below idle floor: a stop
        history.push(temp(ts, 40.0));
    }
    for i in 24..40 {
        let ts = i as i64 * BUCKET_MS;
        history.push(vib(ts, 0.5));
        history.push(temp(ts, 40.0));
    }
    let rows = resample::resample(&history, &c).unwrap();

    for row in &rows {
        // P1
        assert!(row.vib_rms <= row.vib_max + 1e-9, "P1 violated at {}", row.bucket_start_ms);
        // P2
        if !row.is_production || row.vib_rms <= c.idle_floor_g {
            assert_eq!(row.crest_factor, 0.0, "P2 violated at {}", row.bucket_start_ms);
        }
        // P3
        assert_eq!(row.is_production, row.is_production_raw || row.is_rundown, "P3a violated");
        assert_eq!(row.is_break, !row.is_production, "P3b violated");
        if row.is_warmup {
            assert!(row.is_production, "P3c violated: warmup without production");
        }
    }

    // P5: drive the full pipeline and check the all-IDLE channels collapse
    // to IDLE with a dash alarm_source.
    let full_rows = run(&history, "LINE-3-BRG-5", &c);
    for row in &full_rows {
        if row.skf_status == Status::Idle
            && row.siemens_status == Status::Idle
            && row.aws_status == Status::Idle
            && row.rcf_status == Status::Idle
        {
            assert_eq!(row.final_verdict, Status::Idle, "P5 violated at {}", row.bucket_start_ms);
            assert_eq!(row.alarm_source, "-", "P5 violated at {}", row.bucket_start_ms);
        }
    }
}

// L3 — increasing persistence cannot increase the number of alarmed
// intervals; at persistence=1 the fused status equals the raw analyzer
// status (no degradation possible, since the very first interval already
// satisfies the streak requirement).
#[test]
fn l3_increasing_persistence_cannot_increase_alarm_count() {
    let statuses = [
        Status::Monitoring,
        Status::CriticalAlarm,
        Status::Monitoring,
        Status::CriticalAlarm,
        Status::CriticalAlarm,
        Status::Monitoring,
    ];

    let count_active = |persistence: u32| -> usize {
        let cfg = bearing_sentinel::config::PersistenceConfig {
            fire: persistence,
            alarm_standard: persistence,
            alarm_heavy: persistence,
        };
        let mut streak = ChannelStreak::default();
        statuses
            .iter()
            .filter(|&&s| {
                let fused = fuse::debounce_channel(s, &mut streak, bearing_sentinel::domain::SensorProfile::Standard, false, &cfg);
                fused.priority() >= 3
            })
            .count()
    };

    let at_1 = count_active(1);
    let at_2 = count_active(2);
    let at_5 = count_active(5);
    assert!(at_2 <= at_1, "L3 violated: persistence=2 alarmed more than persistence=1");
    assert!(at_5 <= at_2, "L3 violated: persistence=5 alarmed more than persistence=2");

    // persistence=1: every active interval already meets its own streak
    // requirement, so the fused status matches the raw status exactly.
    let cfg1 = bearing_sentinel::config::PersistenceConfig {
        fire: 1,
        alarm_standard: 1,
        alarm_heavy: 1,
    };
    let mut streak = ChannelStreak::default();
    for &s in &statuses {
        let fused = fuse::debounce_channel(s, &mut streak, bearing_sentinel::domain::SensorProfile::Standard, false, &cfg1);
        assert_eq!(fused, s, "persistence=1 must not degrade any interval");
    }
}

// B1 — Cold start ramping at +20C/h during warmup must not fire.
#[test]
fn b1_cold_start_during_warmup_does_not_fire() {
    use bearing_sentinel::engine::analyzers::gradient;
    let t = cfg().gradient;
    let gated = gradient::gate(20.0, 25.0, true, true, false, &t);
    let status = gradient::classify(gated, 25.0, false, true, &t);
    assert_ne!(status, Status::FireStop);
}

// B2 — A vibration collapse to 0.005g with a 15C/h gradient caps HI <= 15.
#[test]
fn b2_seizure_caps_health_index_at_fifteen() {
    use bearing_sentinel::engine::health;
    let seizure = health::is_seizure(0.005, 15.0);
    assert!(seizure);
    let scores = health::SubScores {
        h_vib: health::h_vib(0.0, seizure),
        h_grad: health::h_grad(15.0, false),
        h_abs_temp: health::h_abs_temp(70.0),
        h_iso: health::h_iso(0.005),
        h_cf: 100.0,
        h_rcf: 50.0,
    };
    let hi = health::health_index(&scores, &cfg().health, 70.0, 15.0, seizure, true).unwrap();
    assert!(hi <= 15.0, "HI was {hi}");
}

// B3 — A single cf=10 interval with persistence=2 degrades to PLAN_SERVICE,
// not CRITICAL_ALARM.
#[test]
fn b3_single_high_crest_factor_interval_degrades_to_plan_service() {
    let t = cfg().skf;
    let raw = skf::classify(10.0, false, false, false, bearing_sentinel::domain::SensorProfile::Standard, &t);
    assert_eq!(raw, Status::CriticalAlarm);

    let pcfg = bearing_sentinel::config::PersistenceConfig {
        fire: 1,
        alarm_standard: 2,
        alarm_heavy: 5,
    };
    let mut streak = ChannelStreak::default();
    let fused = fuse::debounce_channel(raw, &mut streak, bearing_sentinel::domain::SensorProfile::Standard, false, &pcfg);
    assert_eq!(fused, Status::PlanService);
}
