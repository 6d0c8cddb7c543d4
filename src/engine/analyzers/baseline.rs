//! Adaptive Baseline Analyzer (C4)
//!
//! Rolling `μ, σ` over a 30-day productive-vibration window, with a local
//! steady-state gate so transient production swings don't get band-checked
//! against a baseline they haven't had time to settle into.

use crate::domain::Status;

/// One interval's contribution to the rolling baseline: `vib_rms` if the
/// interval is productive and above the idle floor, `None` otherwise (the
/// spec's "NaN elsewhere").
pub fn productive_sample(vib_rms: f64, is_production: bool, idle_floor_g: f64) -> Option<f64> {
    if is_production && vib_rms > idle_floor_g {
        Some(vib_rms)
    } else {
        None
    }
}

/// Rolling mean/std over up to `window` productive samples ending at the
/// current point, `min_periods = 1`.
pub fn rolling_mean_std(history: &[f64]) -> (f64, f64) {
    if history.is_empty() {
        return (0.0, 0.0);
    }
    let n = history.len() as f64;
    let mean = history.iter().sum::<f64>() / n;
    let var = history.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Local coefficient-of-variation steady-state test over the trailing
/// `steady_window` productive samples.
pub fn is_steady_state(local_window: &[f64], cv_threshold: f64) -> bool {
    if local_window.is_empty() {
        return false;
    }
    let (mean, std) = rolling_mean_std(local_window);
    if mean <= 0.0 {
        return false;
    }
    (std / mean) < cv_threshold
}

pub struct BaselineBands {
    pub mean: f64,
    pub std: f64,
    pub warning_lower: f64,
    pub warning_upper: f64,
    pub critical_lower: f64,
    pub critical_upper: f64,
}

pub fn bands(mean: f64, std: f64) -> BaselineBands {
    BaselineBands {
        mean,
        std,
        warning_lower: mean - 2.0 * std,
        warning_upper: mean + 2.0 * std,
        critical_lower: mean - 3.0 * std,
        critical_upper: mean + 3.0 * std,
    }
}

/// Classify a productive, steady-state interval against its baseline
/// bands. Non-steady productive intervals are handled by the caller
/// (always `MONITORING`, never reach this function).
pub fn classify(vib_rms: f64, b: &BaselineBands) -> Status {
    if vib_rms < b.critical_lower || vib_rms > b.critical_upper {
        Status::CriticalAlarm
    } else if vib_rms < b.warning_lower || vib_rms > b.warning_upper {
        Status::PlanService
    } else {
        Status::Monitoring
    }
}

/// `baseline_deviation_pct = (vib_rms − μ) / μ × 100`, a report aid only.
pub fn deviation_pct(vib_rms: f64, mean: f64) -> f64 {
    if mean == 0.0 {
        0.0
    } else {
        (vib_rms - mean) / mean * 100.0
    }
}

/// Full C4 classification for one interval: not productive → `IDLE`; not
/// steady → `MONITORING`; otherwise the band classification.
pub fn classify_interval(
    vib_rms: f64,
    is_production: bool,
    is_warmup: bool,
    steady: bool,
    b: &BaselineBands,
) -> Status {
    if !is_production {
        return Status::Idle;
    }
    if is_warmup || !steady {
        return Status::Monitoring;
    }
    classify(vib_rms, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_productive_sample_is_none() {
        assert_eq!(productive_sample(0.05, true, 0.1), None);
        assert_eq!(productive_sample(0.8, false, 0.1), None);
        assert_eq!(productive_sample(0.8, true, 0.1), Some(0.8));
    }

    #[test]
    fn steady_state_detects_low_local_cv() {
        let window = vec![0.80, 0.81, 0.79, 0.80, 0.82, 0.79];
        assert!(is_steady_state(&window, 0.15));
        let noisy = vec![0.5, 1.5, 0.2, 2.0, 0.1, 1.8];
        assert!(!is_steady_state(&noisy, 0.15));
    }

    #[test]
    fn bands_classify_two_and_three_sigma() {
        let b = bands(0.8, 0.05);
        assert_eq!(classify(0.8, &b), Status::Monitoring);
        assert_eq!(classify(0.92, &b), Status::PlanService); // >2sigma
        assert_eq!(classify(1.0, &b), Status::CriticalAlarm); // >3sigma
    }

    #[test]
    fn non_steady_productive_is_never_alarmed() {
        let b = bands(0.8, 0.01);
        assert_eq!(
            classify_interval(5.0, true, false, false, &b),
            Status::Monitoring
        );
    }

    #[test]
    fn non_productive_is_idle_regardless_of_bands() {
        let b = bands(0.8, 0.01);
        assert_eq!(
            classify_interval(5.0, false, false, true, &b),
            Status::Idle
        );
    }
}
