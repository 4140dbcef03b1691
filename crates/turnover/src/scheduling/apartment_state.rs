use super::domain::{ApartmentId, Booking, BookingState, EntityKind, Readiness, Task, TaskId};
use super::error::{RepositoryError, SchedulingError};
use super::policy::TurnoverCoverage;
use super::store::{require, StoreTx};
use super::time_range::TimeRange;

/// Derives and persists an apartment's readiness from its bookings, tasks and assignments.
pub struct ApartmentStateEngine;

impl ApartmentStateEngine {
    /// Recompute readiness and persist it when it changed. Idempotent.
    pub fn recompute(
        tx: &mut dyn StoreTx,
        apartment_id: ApartmentId,
    ) -> Result<Readiness, SchedulingError> {
        let mut apartment = require(
            tx.apartment(apartment_id)?,
            EntityKind::Apartment,
            apartment_id.0,
        )?;
        let readiness = Self::derive(&*tx, apartment_id)?;

        if apartment.readiness != readiness {
            tracing::debug!(
                %apartment_id,
                from = ?apartment.readiness,
                to = ?readiness,
                "apartment readiness changed"
            );
            apartment.readiness = readiness;
            tx.save_apartment(apartment)?;
        }

        Ok(readiness)
    }

    /// Readiness implied by the current data, without persisting it.
    ///
    /// Only the window after the most recently finished stay is inspected.
    pub fn derive(tx: &dyn StoreTx, apartment_id: ApartmentId) -> Result<Readiness, RepositoryError> {
        let bookings = tx.bookings_for_apartment(apartment_id)?;
        if bookings
            .iter()
            .any(|booking| booking.state == BookingState::InProgress)
        {
            return Ok(Readiness::Occupied);
        }

        let regular = regular_tasks(tx, apartment_id)?;
        if regular.is_empty() {
            return Ok(Readiness::Ready);
        }

        let Some(last_finished) = tx.latest_finished_booking(apartment_id)? else {
            return Ok(Readiness::Ready);
        };

        let window = turnover_window(tx, &last_finished)?;
        let pending = uncovered_tasks(tx, &regular, &window, TurnoverCoverage::Finished)?;
        if pending.is_empty() {
            Ok(Readiness::Ready)
        } else {
            Ok(Readiness::Used)
        }
    }
}

pub(crate) fn regular_tasks(
    tx: &dyn StoreTx,
    apartment_id: ApartmentId,
) -> Result<Vec<Task>, RepositoryError> {
    Ok(tx
        .tasks_for_apartment(apartment_id)?
        .into_iter()
        .filter(Task::is_regular)
        .collect())
}

/// Window after a stay during which its turnover happens: from checkout until the next
/// live booking starts, or open-ended when there is none.
pub(crate) fn turnover_window(
    tx: &dyn StoreTx,
    booking: &Booking,
) -> Result<TimeRange, RepositoryError> {
    let next = tx.next_booking(booking.apartment_id, booking.range.end, Some(booking.id))?;
    Ok(match next {
        Some(next) => TimeRange::window(booking.range.end, next.range.start),
        None => TimeRange::starting_at(booking.range.end),
    })
}

/// Window before a stay during which the apartment must be prepared for it.
pub(crate) fn preparation_window(
    tx: &dyn StoreTx,
    booking: &Booking,
) -> Result<TimeRange, RepositoryError> {
    let previous =
        tx.previous_booking(booking.apartment_id, booking.range.start, Some(booking.id))?;
    Ok(match previous {
        Some(previous) => TimeRange::window(previous.range.end, booking.range.start),
        None => TimeRange::ending_at(booking.range.start),
    })
}

/// Regular tasks with no qualifying assignment starting inside `window`.
pub(crate) fn uncovered_tasks(
    tx: &dyn StoreTx,
    tasks: &[Task],
    window: &TimeRange,
    coverage: TurnoverCoverage,
) -> Result<Vec<TaskId>, RepositoryError> {
    let mut uncovered = Vec::new();
    for task in tasks.iter().filter(|task| task.is_regular()) {
        let covered = tx
            .assignments_for_task(task.id)?
            .iter()
            .filter(|assignment| window.contains(assignment.range.start))
            .any(|assignment| match coverage {
                TurnoverCoverage::Assigned => true,
                TurnoverCoverage::Finished => assignment.is_finished(),
            });
        if !covered {
            uncovered.push(task.id);
        }
    }
    Ok(uncovered)
}
