//! Health Index, Probability, and RUL (C8)
//!
//! Six weighted sub-scores combine into a single 0-100 composite, with hard
//! overrides for the conditions too dangerous to average away. Grounded on
//! `processing/health_scoring.rs`'s zone-scoring style: each sub-score is a
//! small piecewise function, clipped to `[0,100]`, and the composite is a
//! weighted sum with floor-capping layered on top.

use crate::config::HealthWeights;
use crate::domain::RiskBucket;

fn clip(x: f64, lo: f64, hi: f64) -> f64 {
    x.max(lo).min(hi)
}

/// Seizure: bearing stopped while temperature still rising.
pub fn is_seizure(vib_rms: f64, temp_gradient_final: f64) -> bool {
    vib_rms < 0.01 && temp_gradient_final > 12.0
}

pub fn h_vib(deviation_pct: f64, seizure: bool) -> f64 {
    if seizure {
        return 0.0;
    }
    clip((1.0 - deviation_pct.abs() / 200.0) * 100.0, 0.0, 100.0)
}

pub fn h_grad(grad: f64, is_warmup: bool) -> f64 {
    let base = clip((1.0 - grad.max(0.0) / 15.0) * 100.0, 0.0, 100.0);
    if is_warmup {
        0.5 * base + 50.0
    } else {
        base
    }
}

/// Linear interpolation between 55C -> 100 and 90C -> 0, clipped.
pub fn h_abs_temp(temp_mean: f64) -> f64 {
    let score = 100.0 - (temp_mean - 55.0) / (90.0 - 55.0) * 100.0;
    clip(score, 0.0, 100.0)
}

/// Piecewise-linear ISO 10816-1 Class I envelope on `vib_rms`.
pub fn h_iso(vib_rms: f64) -> f64 {
    const POINTS: [(f64, f64); 4] = [(0.0, 100.0), (0.71, 100.0), (1.80, 50.0), (4.50, 0.0)];

    if vib_rms <= POINTS[0].0 {
        return POINTS[0].1;
    }
    if vib_rms >= POINTS[3].0 {
        return POINTS[3].1;
    }
    for w in POINTS.windows(2) {
        let (x0, y0) = w[0];
        let (x1, y1) = w[1];
        if vib_rms >= x0 && vib_rms <= x1 {
            let frac = (vib_rms - x0) / (x1 - x0);
            return y0 + frac * (y1 - y0);
        }
    }
    0.0
}

pub fn h_cf(cf: f64, cf_critical: f64) -> f64 {
    clip((1.0 - (cf - 1.0) / (cf_critical - 1.0)) * 100.0, 0.0, 100.0)
}

pub fn h_rcf(rcf_score: f64) -> f64 {
    clip((rcf_score + 0.2) / 0.3, 0.0, 1.0) * 100.0
}

pub struct SubScores {
    pub h_vib: f64,
    pub h_grad: f64,
    pub h_abs_temp: f64,
    pub h_iso: f64,
    pub h_cf: f64,
    pub h_rcf: f64,
}

/// Weighted composite, clipped to `[0,100]`, before hard overrides.
pub fn composite(scores: &SubScores, weights: &HealthWeights) -> f64 {
    let raw = weights.vib * scores.h_vib
        + weights.iso * scores.h_iso
        + weights.grad * scores.h_grad
        + weights.abs_temp * scores.h_abs_temp
        + weights.cf * scores.h_cf
        + weights.rcf * scores.h_rcf;
    clip(raw, 0.0, 100.0)
}

/// Apply the hard caps (temp, gradient, seizure) on top of the composite.
/// Returns `None` for non-productive intervals (HI is undefined there).
pub fn health_index(
    scores: &SubScores,
    weights: &HealthWeights,
    temp_mean: f64,
    grad: f64,
    seizure: bool,
    is_production: bool,
) -> Option<f64> {
    if !is_production {
        return None;
    }
    let mut hi = composite(scores, weights);
    if temp_mean > 80.0 {
        hi = hi.min(30.0);
    }
    if grad > 20.0 {
        hi = hi.min(25.0);
    }
    if seizure {
        hi = hi.min(15.0);
    }
    Some(hi)
}

/// `hi_trend(t) = HI(t) - HI(t - lookback)`.
pub fn hi_trend(current: Option<f64>, lagged: Option<f64>) -> Option<f64> {
    match (current, lagged) {
        (Some(c), Some(l)) => Some(c - l),
        _ => None,
    }
}

/// RUL in hours until HI reaches `floor`, clipped to `[0, max_hours]`.
/// `hourly_rate` is `HI(t) - HI(t - 1h)`.
pub fn rul_hours(hi: f64, hourly_rate: f64, floor: f64, max_hours: f64) -> Option<f64> {
    if hourly_rate < -0.1 && hi > floor {
        let rul = (hi - floor) / (-hourly_rate);
        Some(clip(rul, 0.0, max_hours))
    } else {
        None
    }
}

/// Sigmoid-based failure probability, trend-adjusted, for productive
/// intervals only.
pub fn failure_probability(hi: f64, trend: Option<f64>, is_production: bool) -> Option<f64> {
    if !is_production {
        return None;
    }
    let p_base = 1.0 / (1.0 + (-10.0 * (0.45 - hi / 100.0)).exp());
    let trend_mod = match trend {
        Some(t) => clip(-t / 100.0, 0.0, 0.30),
        None => 0.0,
    };
    Some((p_base + trend_mod).min(0.99) * 100.0)
}

/// Risk bucket from `failure_probability` (percent, 0-100), `IDLE` when
/// the interval is non-productive (probability undefined).
pub fn risk_bucket(failure_probability: Option<f64>) -> RiskBucket {
    match failure_probability {
        None => RiskBucket::Idle,
        Some(p) if p <= 5.0 => RiskBucket::Low,
        Some(p) if p <= 25.0 => RiskBucket::Moderate,
        Some(p) if p <= 60.0 => RiskBucket::High,
        Some(_) => RiskBucket::Critical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> HealthWeights {
        HealthWeights {
            vib: 0.20,
            iso: 0.20,
            grad: 0.20,
            abs_temp: 0.15,
            cf: 0.10,
            rcf: 0.15,
            cf_critical: 6.0,
        }
    }

    #[test]
    fn clean_operation_yields_high_health_index() {
        // S1: vib_rms=0.8, temp=42C, constant, no gradient, cf~3.5 (quiet).
        let scores = SubScores {
            h_vib: h_vib(0.0, false),
            h_grad: h_grad(0.0, false),
            h_abs_temp: 100.0, // below 55C floor
            h_iso: h_iso(0.8),
            h_cf: h_cf(3.5, weights().cf_critical),
            h_rcf: h_rcf(0.1),
        };
        let hi = health_index(&scores, &weights(), 42.0, 0.0, false, true).unwrap();
        assert!(hi >= 95.0, "HI was {hi}");
    }

    #[test]
    fn seizure_overrides_cap_health_index_at_15() {
        // B2: vib collapses to 0.005g with gradient at 15 C/h.
        let seizure = is_seizure(0.005, 15.0);
        assert!(seizure);
        let scores = SubScores {
            h_vib: h_vib(0.0, seizure),
            h_grad: h_grad(15.0, false),
            h_abs_temp: 80.0,
            h_iso: h_iso(0.005),
            h_cf: 100.0,
            h_rcf: 50.0,
        };
        let hi = health_index(&scores, &weights(), 70.0, 15.0, seizure, true).unwrap();
        assert!(hi <= 15.0, "HI was {hi}");
    }

    #[test]
    fn hot_temperature_caps_at_thirty() {
        let scores = SubScores {
            h_vib: 100.0,
            h_grad: 100.0,
            h_abs_temp: 100.0,
            h_iso: 100.0,
            h_cf: 100.0,
            h_rcf: 100.0,
        };
        let hi = health_index(&scores, &weights(), 85.0, 0.0, false, true).unwrap();
        assert!(hi <= 30.0);
    }

    #[test]
    fn non_productive_interval_has_no_health_index() {
        let scores = SubScores {
            h_vib: 100.0,
            h_grad: 100.0,
            h_abs_temp: 100.0,
            h_iso: 100.0,
            h_cf: 100.0,
            h_rcf: 100.0,
        };
        assert_eq!(health_index(&scores, &weights(), 30.0, 0.0, false, false), None);
    }

    #[test]
    fn seized_shaft_scenario_yields_high_risk() {
        // S3: failure_probability >= 75%, risk_level = CRITICAL.
        let hi = 10.0;
        let fp = failure_probability(hi, Some(-40.0), true).unwrap();
        assert!(fp >= 75.0, "fp was {fp}");
        assert_eq!(risk_bucket(Some(fp)), RiskBucket::Critical);
    }

    #[test]
    fn rul_undefined_when_health_improving() {
        assert_eq!(rul_hours(80.0, 1.0, 15.0, 168.0), None);
    }

    #[test]
    fn rul_extrapolates_and_clips_to_max_hours() {
        let rul = rul_hours(95.0, -0.05 - 0.2, 15.0, 168.0).unwrap();
        assert!(rul <= 168.0);
    }
}
