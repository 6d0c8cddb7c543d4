//! Thermal Gradient Analyzer (C5)

use crate::config::GradientThresholds;
use crate::domain::Status;

/// Ambient-compensated temperature: `temp_mean − hall_temp` when a hall
/// reference is supplied, else `temp_mean` unchanged (L2).
pub fn compensate(temp_mean: f64, hall_temp: Option<f64>) -> f64 {
    temp_mean - hall_temp.unwrap_or(0.0)
}

/// Discrete gradient: `diff(temp, periods=window) / window_hours`.
pub fn discrete_gradient(current: f64, lagged: f64, window_intervals: i64, bucket_minutes: i64) -> f64 {
    let window_hours = (window_intervals * bucket_minutes) as f64 / 60.0;
    (current - lagged) / window_hours
}

/// Smoothed gradient over a rolling window: `(last − first) / window_hours`.
pub fn smoothed_gradient(window: &[f64], bucket_minutes: i64) -> Option<f64> {
    if window.len() < 2 {
        return None;
    }
    let window_hours = (window.len() as i64 * bucket_minutes) as f64 / 60.0;
    if window_hours <= 0.0 {
        return None;
    }
    Some((window[window.len() - 1] - window[0]) / window_hours)
}

/// `temp_gradient_final = smoothed, falling back to discrete, defaulting to 0`.
pub fn final_gradient(smoothed: Option<f64>, discrete: Option<f64>) -> f64 {
    smoothed.or(discrete).unwrap_or(0.0)
}

/// Whether this interval is an extreme-fire override: bypasses debouncing
/// and cold-start gating on any channel.
pub fn is_extreme_fire(grad: f64, temp_mean: f64, t: &GradientThresholds) -> bool {
    grad >= t.fire_gradient && temp_mean >= t.fire_temp
}

/// Gate the raw gradient for alarm purposes: zeroed outside productive,
/// warmup, and break intervals unless the extreme-fire override fires.
pub fn gate(grad: f64, temp_mean: f64, is_production: bool, is_warmup: bool, is_break: bool, t: &GradientThresholds) -> f64 {
    if is_extreme_fire(grad, temp_mean, t) {
        return grad;
    }
    if is_break || is_warmup || !is_production {
        return 0.0;
    }
    grad
}

/// Classify per spec §4.5's ordered table. `grad` is the *gated* gradient.
pub fn classify(
    grad: f64,
    temp_mean: f64,
    is_break: bool,
    is_production: bool,
    t: &GradientThresholds,
) -> Status {
    if is_extreme_fire(grad, temp_mean, t) {
        return Status::FireStop;
    }
    if is_break || !is_production {
        return Status::Idle;
    }
    if grad < t.monitoring_ceiling {
        return Status::Monitoring;
    }
    if grad < t.plan_service_ceiling {
        return Status::PlanService;
    }
    // grad >= plan_service_ceiling
    if temp_mean >= t.fire_temp {
        Status::FireStop
    } else {
        // cold start: degraded
        Status::PlanService
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> GradientThresholds {
        GradientThresholds {
            monitoring_ceiling: 10.0,
            plan_service_ceiling: 15.0,
            fire_gradient: 30.0,
            fire_temp: 45.0,
            window_intervals: 12,
        }
    }

    #[test]
    fn zero_hall_reference_is_round_trip_identity() {
        assert_eq!(compensate(42.0, None), 42.0);
        assert_eq!(compensate(42.0, Some(0.0)), 42.0);
    }

    #[test]
    fn extreme_fire_requires_both_conditions() {
        let t = thresholds();
        assert!(is_extreme_fire(30.0, 45.0, &t));
        assert!(!is_extreme_fire(30.0, 40.0, &t));
        assert!(!is_extreme_fire(25.0, 50.0, &t));
    }

    #[test]
    fn cold_start_degrades_instead_of_fire_stop() {
        // B1: cold start ramping at +20 C/h during warmup must not fire.
        let t = thresholds();
        let gated = gate(20.0, 25.0, true, true, false, &t);
        assert_eq!(gated, 0.0);
        assert_eq!(classify(gated, 25.0, false, true, &t), Status::Monitoring);
    }

    #[test]
    fn textbook_fire_classifies_fire_stop() {
        // S2: temp rises at +35 C/h from 45 C baseline.
        let t = thresholds();
        let status = classify(35.0, 46.0, false, true, &t);
        assert_eq!(status, Status::FireStop);
    }

    #[test]
    fn high_gradient_without_heat_is_plan_service_not_fire() {
        let t = thresholds();
        assert_eq!(classify(20.0, 30.0, false, true, &t), Status::PlanService);
    }

    #[test]
    fn break_or_non_productive_is_idle() {
        let t = thresholds();
        assert_eq!(classify(20.0, 50.0, true, true, &t), Status::Idle);
        assert_eq!(classify(20.0, 50.0, false, false, &t), Status::Idle);
    }

    #[test]
    fn final_gradient_prefers_smoothed_over_discrete() {
        assert_eq!(final_gradient(Some(5.0), Some(10.0)), 5.0);
        assert_eq!(final_gradient(None, Some(10.0)), 10.0);
        assert_eq!(final_gradient(None, None), 0.0);
    }
}
