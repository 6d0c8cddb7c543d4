//! Alarm Fuser (C7)
//!
//! Projects the four analyzer channels onto the §4.7 priority lattice,
//! debounces transient peaks with a per-channel persistence state machine,
//! and degrades unpersisted alarms one level at a time rather than
//! silently dropping them to green.

use crate::config::PersistenceConfig;
use crate::domain::{AnalyzerTag, SensorProfile, Status};

/// Per-channel persistence state, carried forward cycle to cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelStreak {
    pub streak: u32,
}

impl ChannelStreak {
    /// Advance the streak state machine by one interval. Returns the
    /// updated streak length.
    pub fn advance(&mut self, active: bool) -> u32 {
        if active {
            self.streak += 1;
        } else {
            self.streak = 0;
        }
        self.streak
    }
}

fn required_streak(status: Status, profile: SensorProfile, cfg: &PersistenceConfig) -> u32 {
    match status {
        Status::FireStop => cfg.fire,
        _ => match profile {
            SensorProfile::Standard => cfg.alarm_standard,
            SensorProfile::HeavyImpact => cfg.alarm_heavy,
        },
    }
}

/// Degrade one level per spec §4.7's degradation policy.
fn degrade_one_level(status: Status) -> Status {
    match status {
        Status::FireStop => Status::CriticalAlarm,
        Status::CriticalAlarm => Status::PlanService,
        Status::PlanService => Status::Monitoring,
        other => other,
    }
}

/// Apply debounce + degradation to one channel for the current interval.
/// `extreme_fire` bypasses debouncing entirely (treated as already
/// persistent).
pub fn debounce_channel(
    status: Status,
    streak_state: &mut ChannelStreak,
    profile: SensorProfile,
    extreme_fire: bool,
    cfg: &PersistenceConfig,
) -> Status {
    let active = status.priority() >= 3;
    let streak = streak_state.advance(active);

    if !active {
        return status;
    }
    if extreme_fire {
        return status;
    }

    let required = required_streak(status, profile, cfg);
    if streak >= required {
        status
    } else {
        degrade_one_level(status)
    }
}

pub struct ChannelStatuses {
    pub skf: Status,
    pub siemens: Status,
    pub aws: Status,
    pub rcf: Status,
}

pub struct FusedVerdict {
    pub final_verdict: Status,
    pub max_priority: u8,
    pub alarm_source: String,
}

/// Fuse four post-debounce channel statuses into a single verdict (P4, P5).
pub fn fuse(statuses: &ChannelStatuses) -> FusedVerdict {
    let channels = [
        (AnalyzerTag::Skf, statuses.skf),
        (AnalyzerTag::Siemens, statuses.siemens),
        (AnalyzerTag::Aws, statuses.aws),
        (AnalyzerTag::Rcf, statuses.rcf),
    ];

    let max_priority = channels.iter().map(|(_, s)| s.priority()).max().unwrap_or(0);

    let mut tags: Vec<&'static str> = channels
        .iter()
        .filter(|(_, s)| s.priority() >= 3)
        .map(|(tag, _)| tag.as_str())
        .collect();
    tags.sort_unstable();

    let alarm_source = if tags.is_empty() {
        "-".to_string()
    } else {
        tags.join("+")
    };

    FusedVerdict {
        final_verdict: Status::from_priority(max_priority),
        max_priority,
        alarm_source,
    }
}
