use chrono::NaiveDateTime;
use serde::Serialize;

use super::apartment_state::{preparation_window, regular_tasks, uncovered_tasks};
use super::domain::{
    Assignment, AssignmentFilter, Booking, BookingFilter, BookingState, OwnerId, TaskId,
};
use super::error::SchedulingError;
use super::policy::AlertThresholds;
use super::store::StoreTx;
use super::time_range::TimeRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    Red,
    Yellow,
}

/// Upcoming booking whose turnover is not secured yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingAlert {
    pub booking: Booking,
    pub level: AlertLevel,
    /// `DAYS_LEFT_{n}_UNASSIGNED` where `n` is the threshold that fired.
    pub code: String,
    pub days_until_check_in: i64,
    pub unassigned_tasks: Vec<TaskId>,
}

/// Aggregate behind the scheduler board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerWindow {
    pub range: TimeRange,
    pub bookings: Vec<Booking>,
    pub red_alerts: Vec<BookingAlert>,
    pub yellow_alerts: Vec<BookingAlert>,
    pub assignments: Vec<Assignment>,
    pub extra_assignments: Vec<Assignment>,
}

/// Read-only computation of turnover risk for bookings starting inside a range.
pub struct TurnoverAlertComputer {
    thresholds: AlertThresholds,
    now: NaiveDateTime,
}

impl TurnoverAlertComputer {
    pub fn new(thresholds: AlertThresholds, now: NaiveDateTime) -> Self {
        Self { thresholds, now }
    }

    pub fn compute(
        &self,
        tx: &dyn StoreTx,
        caller: &OwnerId,
        range: &TimeRange,
    ) -> Result<SchedulerWindow, SchedulingError> {
        let mut bookings: Vec<Booking> = tx
            .search_bookings(
                caller,
                &BookingFilter {
                    from: Some(range.start),
                    to: Some(range.end),
                    ..BookingFilter::default()
                },
            )?
            .into_iter()
            .filter(|booking| !booking.is_cancelled())
            .collect();
        bookings.sort_by_key(|booking| (booking.range.start, booking.id));

        let mut red_alerts = Vec::new();
        let mut yellow_alerts = Vec::new();
        for booking in bookings
            .iter()
            .filter(|booking| range.contains(booking.range.start))
        {
            match self.alert_for(tx, booking)? {
                Some(alert) if alert.level == AlertLevel::Red => red_alerts.push(alert),
                Some(alert) => yellow_alerts.push(alert),
                None => {}
            }
        }

        let mut assignments = tx.search_assignments(
            caller,
            &AssignmentFilter {
                from: Some(range.start),
                to: Some(range.end),
                ..AssignmentFilter::default()
            },
        )?;
        assignments.sort_by_key(|assignment| (assignment.range.start, assignment.id));

        let mut regular = Vec::new();
        let mut extra_assignments = Vec::new();
        for assignment in assignments {
            let is_extra = tx
                .task(assignment.task_id)?
                .is_some_and(|task| task.extra);
            if is_extra {
                extra_assignments.push(assignment);
            } else {
                regular.push(assignment);
            }
        }

        tracing::debug!(
            bookings = bookings.len(),
            red = red_alerts.len(),
            yellow = yellow_alerts.len(),
            "scheduler window computed"
        );

        Ok(SchedulerWindow {
            range: *range,
            bookings,
            red_alerts,
            yellow_alerts,
            assignments: regular,
            extra_assignments,
        })
    }

    /// Alert for a single upcoming booking, if its preparation is at risk.
    ///
    /// Days until check-in are whole elapsed days from now, truncated. Only PENDING
    /// bookings are considered: a stay that has checked in needs no preparation.
    pub fn alert_for(
        &self,
        tx: &dyn StoreTx,
        booking: &Booking,
    ) -> Result<Option<BookingAlert>, SchedulingError> {
        if booking.state != BookingState::Pending {
            return Ok(None);
        }

        let days = (booking.range.start - self.now).num_days();
        if days > self.thresholds.yellow_days {
            return Ok(None);
        }

        let tasks = regular_tasks(tx, booking.apartment_id)?;
        if tasks.is_empty() {
            return Ok(None);
        }

        let window = preparation_window(tx, booking)?;
        let unassigned = uncovered_tasks(tx, &tasks, &window, self.thresholds.coverage)?;
        if unassigned.is_empty() {
            return Ok(None);
        }

        let (level, threshold) = if days <= self.thresholds.red_days {
            (AlertLevel::Red, self.thresholds.red_days)
        } else {
            (AlertLevel::Yellow, self.thresholds.yellow_days)
        };

        Ok(Some(BookingAlert {
            booking: booking.clone(),
            level,
            code: format!("DAYS_LEFT_{threshold}_UNASSIGNED"),
            days_until_check_in: days,
            unassigned_tasks: unassigned,
        }))
    }
}
