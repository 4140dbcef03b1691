use chrono::{Duration, NaiveDateTime, NaiveTime};

use super::time_range::TimeRange;
use serde::{Deserialize, Serialize};

/// What makes a regular task count as covered for a turnover window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnoverCoverage {
    /// Any assignment in the window, pending or finished.
    Assigned,
    /// Only finished assignments.
    Finished,
}

impl TurnoverCoverage {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "assigned" => Some(Self::Assigned),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }
}

/// Bounds on when turnover work may be scheduled relative to the next check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepWindow {
    /// Work must end at least this long before the next booking starts.
    pub lead_before_check_in: Duration,
    /// Work may not start earlier than this before the next booking starts.
    pub max_ahead_of_check_in: Option<Duration>,
}

/// Which bound of the preparation window a piece of work misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepViolation {
    TooLate,
    TooEarly,
}

impl PrepWindow {
    /// Checks `work` against a check-in at `check_in`.
    pub fn check(&self, work: &TimeRange, check_in: NaiveDateTime) -> Option<PrepViolation> {
        let deadline = check_in
            .checked_sub_signed(self.lead_before_check_in)
            .unwrap_or(NaiveDateTime::MIN);
        if work.end > deadline {
            return Some(PrepViolation::TooLate);
        }
        let too_early = self.max_ahead_of_check_in.is_some_and(|ahead| {
            let earliest = check_in
                .checked_sub_signed(ahead)
                .unwrap_or(NaiveDateTime::MIN);
            work.start < earliest
        });
        too_early.then_some(PrepViolation::TooEarly)
    }
}

impl Default for PrepWindow {
    fn default() -> Self {
        Self {
            lead_before_check_in: Duration::minutes(60),
            max_ahead_of_check_in: None,
        }
    }
}

/// Days-to-check-in thresholds for turnover alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertThresholds {
    pub red_days: i64,
    pub yellow_days: i64,
    pub coverage: TurnoverCoverage,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            red_days: 2,
            yellow_days: 5,
            coverage: TurnoverCoverage::Assigned,
        }
    }
}

/// Tunables of the scheduling engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingPolicy {
    pub prep_window: PrepWindow,
    pub alerts: AlertThresholds,
    pub scheduler_window_days: i64,
    /// Wall-clock times applied to date-only imports.
    pub check_in_time: NaiveTime,
    pub check_out_time: NaiveTime,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            prep_window: PrepWindow::default(),
            alerts: AlertThresholds::default(),
            scheduler_window_days: 7,
            check_in_time: NaiveTime::from_hms_opt(15, 0, 0).unwrap_or(NaiveTime::MIN),
            check_out_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}
