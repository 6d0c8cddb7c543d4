//! SKF Crest-Factor Analyzer (C3)

use crate::config::SkfThresholds;
use crate::domain::{SensorProfile, Status};

/// `crest_factor = vib_max / vib_rms` where productive and above idle
/// floor, else 0.
pub fn crest_factor(vib_max: f64, vib_rms: f64, is_production: bool, idle_floor_g: f64) -> f64 {
    if is_production && vib_rms > idle_floor_g {
        vib_max / vib_rms
    } else {
        0.0
    }
}

/// Classify a crest-factor reading per spec §4.3's ordered table.
pub fn classify(
    cf: f64,
    is_break: bool,
    is_idle: bool,
    is_warmup: bool,
    profile: SensorProfile,
    thresholds: &SkfThresholds,
) -> Status {
    if is_break || is_idle {
        return Status::Idle;
    }
    if is_warmup {
        return Status::Monitoring;
    }

    let (warn, crit) = match profile {
        SensorProfile::Standard => (thresholds.warn_standard, thresholds.crit_standard),
        SensorProfile::HeavyImpact => (thresholds.warn_heavy, thresholds.crit_heavy),
    };

    if cf < thresholds.floor {
        Status::Monitoring
    } else if cf < warn {
        Status::PlanService
    } else if cf < crit {
        Status::PlanService
    } else {
        Status::CriticalAlarm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> SkfThresholds {
        SkfThresholds {
            warn_standard: 5.0,
            crit_standard: 6.0,
            warn_heavy: 6.0,
            crit_heavy: 8.0,
            floor: 3.0,
        }
    }

    #[test]
    fn crest_factor_zero_when_not_productive() {
        assert_eq!(crest_factor(4.0, 2.0, false, 0.1), 0.0);
        assert_eq!(crest_factor(4.0, 0.05, true, 0.1), 0.0);
    }

    #[test]
    fn break_and_idle_always_idle_status() {
        let t = thresholds();
        assert_eq!(
            classify(9.0, true, false, false, SensorProfile::Standard, &t),
            Status::Idle
        );
        assert_eq!(
            classify(9.0, false, true, false, SensorProfile::Standard, &t),
            Status::Idle
        );
    }

    #[test]
    fn warmup_is_monitoring_regardless_of_crest_factor() {
        let t = thresholds();
        assert_eq!(
            classify(9.0, false, false, true, SensorProfile::Standard, &t),
            Status::Monitoring
        );
    }

    #[test]
    fn below_floor_is_monitoring() {
        let t = thresholds();
        assert_eq!(
            classify(2.0, false, false, false, SensorProfile::Standard, &t),
            Status::Monitoring
        );
    }

    #[test]
    fn standard_profile_crit_threshold() {
        let t = thresholds();
        assert_eq!(
            classify(6.5, false, false, false, SensorProfile::Standard, &t),
            Status::CriticalAlarm
        );
        assert_eq!(
            classify(5.5, false, false, false, SensorProfile::Standard, &t),
            Status::PlanService
        );
    }

    #[test]
    fn heavy_impact_profile_uses_wider_band() {
        let t = thresholds();
        // 6.5 would be CRITICAL_ALARM for standard but PLAN_SERVICE for heavy impact.
        assert_eq!(
            classify(6.5, false, false, false, SensorProfile::HeavyImpact, &t),
            Status::PlanService
        );
        assert_eq!(
            classify(8.5, false, false, false, SensorProfile::HeavyImpact, &t),
            Status::CriticalAlarm
        );
    }
}
