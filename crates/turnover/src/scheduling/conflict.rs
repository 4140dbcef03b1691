use super::domain::{
    ApartmentId, Assignment, AssignmentId, Booking, BookingId, EntityKind, WorkerId,
};
use super::error::{RepositoryError, SchedulingError};
use super::store::StoreTx;
use super::time_range::TimeRange;

/// Read-only overlap queries composed over the store.
///
/// Every result excludes cancelled bookings and the record being updated, and is
/// ordered by start.
pub struct ConflictDetector;

impl ConflictDetector {
    pub fn bookings_for_apartment(
        tx: &dyn StoreTx,
        apartment_id: ApartmentId,
        candidate: &TimeRange,
        exclude: Option<BookingId>,
    ) -> Result<Vec<Booking>, RepositoryError> {
        let mut bookings: Vec<Booking> = tx
            .bookings_overlapping(apartment_id, candidate, exclude)?
            .into_iter()
            .filter(|booking| !booking.is_cancelled())
            .filter(|booking| Some(booking.id) != exclude && booking.range.overlaps(candidate))
            .collect();
        bookings.sort_by_key(|booking| (booking.range.start, booking.id));
        Ok(bookings)
    }

    pub fn assignments_for_worker(
        tx: &dyn StoreTx,
        worker_id: WorkerId,
        candidate: &TimeRange,
        exclude: Option<AssignmentId>,
    ) -> Result<Vec<Assignment>, RepositoryError> {
        let assignments = tx.worker_assignments_overlapping(worker_id, candidate, exclude)?;
        Ok(Self::sorted_overlaps(assignments, candidate, exclude))
    }

    pub fn assignments_for_apartment(
        tx: &dyn StoreTx,
        apartment_id: ApartmentId,
        candidate: &TimeRange,
        exclude: Option<AssignmentId>,
    ) -> Result<Vec<Assignment>, RepositoryError> {
        let assignments = tx.apartment_assignments_overlapping(apartment_id, candidate, exclude)?;
        Ok(Self::sorted_overlaps(assignments, candidate, exclude))
    }

    /// Fails `NotAvailableDates` on the first live booking of the apartment overlapping `candidate`.
    pub fn ensure_apartment_free(
        tx: &dyn StoreTx,
        apartment_id: ApartmentId,
        candidate: &TimeRange,
        exclude: Option<BookingId>,
    ) -> Result<(), SchedulingError> {
        match Self::bookings_for_apartment(tx, apartment_id, candidate, exclude)?.first() {
            Some(booking) => {
                tracing::debug!(%apartment_id, booking_id = %booking.id, "apartment overlap detected");
                Err(SchedulingError::NotAvailableDates {
                    entity: EntityKind::Booking,
                    id: booking.id.0,
                })
            }
            None => Ok(()),
        }
    }

    /// Fails `NotAvailableDates` on the first assignment of the worker overlapping `candidate`.
    pub fn ensure_worker_free(
        tx: &dyn StoreTx,
        worker_id: WorkerId,
        candidate: &TimeRange,
        exclude: Option<AssignmentId>,
    ) -> Result<(), SchedulingError> {
        match Self::assignments_for_worker(tx, worker_id, candidate, exclude)?.first() {
            Some(assignment) => {
                tracing::debug!(%worker_id, assignment_id = %assignment.id, "worker overlap detected");
                Err(SchedulingError::NotAvailableDates {
                    entity: EntityKind::Assignment,
                    id: assignment.id.0,
                })
            }
            None => Ok(()),
        }
    }

    fn sorted_overlaps(
        assignments: Vec<Assignment>,
        candidate: &TimeRange,
        exclude: Option<AssignmentId>,
    ) -> Vec<Assignment> {
        let mut assignments: Vec<Assignment> = assignments
            .into_iter()
            .filter(|assignment| {
                Some(assignment.id) != exclude && assignment.range.overlaps(candidate)
            })
            .collect();
        assignments.sort_by_key(|assignment| (assignment.range.start, assignment.id));
        assignments
    }
}
