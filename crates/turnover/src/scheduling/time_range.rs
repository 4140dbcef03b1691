use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::error::SchedulingError;

/// Half-open interval `[start, end)` on the local wall clock of the apartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeRange {
    /// Build a non-empty interval, rejecting `start >= end`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, SchedulingError> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(SchedulingError::InvalidInterval { start, end })
        }
    }

    /// Interval of `duration` starting at `start`.
    pub fn with_duration(start: NaiveDateTime, duration: Duration) -> Result<Self, SchedulingError> {
        let end = start
            .checked_add_signed(duration)
            .unwrap_or(NaiveDateTime::MAX);
        Self::new(start, end)
    }

    /// Window between two instants. May be empty when `end <= start`.
    pub fn window(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Open-ended window starting at `start`.
    pub fn starting_at(start: NaiveDateTime) -> Self {
        Self {
            start,
            end: NaiveDateTime::MAX,
        }
    }

    /// Open-ended window finishing at `end`.
    pub fn ending_at(end: NaiveDateTime) -> Self {
        Self {
            start: NaiveDateTime::MIN,
            end,
        }
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn contains_range(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn is_unbounded(&self) -> bool {
        self.end == NaiveDateTime::MAX
    }

    pub fn duration(&self) -> Duration {
        if self.is_empty() {
            Duration::zero()
        } else {
            self.end.signed_duration_since(self.start)
        }
    }
}
