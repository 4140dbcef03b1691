use std::collections::HashSet;

use chrono::NaiveDateTime;

use super::apartment_state::{preparation_window, turnover_window, ApartmentStateEngine};
use super::conflict::ConflictDetector;
use super::domain::{
    Apartment, ApartmentId, Assignment, Booking, BookingFilter, BookingId, BookingState, BookingUpdate,
    EntityKind, NewBooking, OwnerId,
};
use super::error::SchedulingError;
use super::policy::{PrepViolation, PrepWindow};
use super::store::{ensure_owner, require, StoreTx};
use super::time_range::TimeRange;

/// Booking writes and the apartment-level occupancy rules they must respect.
pub struct BookingLifecycle {
    prep_window: PrepWindow,
}

impl BookingLifecycle {
    pub fn new(prep_window: PrepWindow) -> Self {
        Self { prep_window }
    }

    pub fn create(
        &self,
        tx: &mut dyn StoreTx,
        caller: &OwnerId,
        request: NewBooking,
    ) -> Result<Booking, SchedulingError> {
        let apartment = owned_apartment(&*tx, caller, request.apartment_id)?;
        let range = TimeRange::new(request.start, request.end)?;
        ConflictDetector::ensure_apartment_free(&*tx, apartment.id, &range, None)?;

        let booking = Booking {
            id: BookingId(tx.allocate_id(EntityKind::Booking)?),
            apartment_id: apartment.id,
            range,
            name: request.name,
            price_cents: request.price_cents,
            paid: request.paid,
            state: BookingState::Pending,
            source: request.source,
            owner: caller.clone(),
        };
        ensure_ordered_with_neighbours(&*tx, &booking)?;
        self.ensure_turnover_clear(&*tx, &booking)?;

        let booking = tx.save_booking(booking)?;
        let readiness = ApartmentStateEngine::recompute(tx, apartment.id)?;
        tracing::info!(booking_id = %booking.id, apartment_id = %apartment.id, ?readiness, "booking created");
        Ok(booking)
    }

    pub fn get(
        &self,
        tx: &dyn StoreTx,
        caller: &OwnerId,
        id: BookingId,
    ) -> Result<Booking, SchedulingError> {
        owned_booking(tx, caller, id)
    }

    pub fn search(
        &self,
        tx: &dyn StoreTx,
        caller: &OwnerId,
        filter: &BookingFilter,
    ) -> Result<Vec<Booking>, SchedulingError> {
        let mut bookings = tx.search_bookings(caller, filter)?;
        bookings.sort_by_key(|booking| (booking.range.start, booking.id));
        Ok(bookings)
    }

    pub fn update(
        &self,
        tx: &mut dyn StoreTx,
        caller: &OwnerId,
        update: BookingUpdate,
    ) -> Result<Booking, SchedulingError> {
        let current = owned_booking(&*tx, caller, update.id)?;

        let start = update.start.unwrap_or(current.range.start);
        let end = update.end.unwrap_or(current.range.end);
        let mut changed = current.clone();
        changed.range = TimeRange::new(start, end)?;
        if let Some(state) = update.state {
            changed.state = state;
        }
        if let Some(name) = update.name {
            changed.name = name;
        }
        if let Some(price_cents) = update.price_cents {
            changed.price_cents = price_cents;
        }
        if let Some(paid) = update.paid {
            changed.paid = paid;
        }

        self.validate_change(&*tx, &current, &changed)?;

        let saved = tx.save_booking(changed)?;
        let readiness = ApartmentStateEngine::recompute(tx, saved.apartment_id)?;
        tracing::info!(
            booking_id = %saved.id,
            apartment_id = %saved.apartment_id,
            state = saved.state.label(),
            ?readiness,
            "booking updated"
        );
        Ok(saved)
    }

    pub fn set_state(
        &self,
        tx: &mut dyn StoreTx,
        caller: &OwnerId,
        id: BookingId,
        state: BookingState,
    ) -> Result<Booking, SchedulingError> {
        self.update(tx, caller, BookingUpdate::state_only(id, state))
    }

    /// Removes a booking unless turnover work or adjacent-booking ordering depends on it.
    pub fn delete(
        &self,
        tx: &mut dyn StoreTx,
        caller: &OwnerId,
        id: BookingId,
    ) -> Result<(), SchedulingError> {
        let booking = owned_booking(&*tx, caller, id)?;
        if !booking.is_cancelled() {
            ensure_removable(&*tx, &booking)?;
        }

        tx.delete_booking(booking.id)?;
        let readiness = ApartmentStateEngine::recompute(tx, booking.apartment_id)?;
        tracing::info!(booking_id = %booking.id, apartment_id = %booking.apartment_id, ?readiness, "booking deleted");
        Ok(())
    }

    fn validate_change(
        &self,
        tx: &dyn StoreTx,
        current: &Booking,
        changed: &Booking,
    ) -> Result<(), SchedulingError> {
        let range_changed = current.range != changed.range;
        let state_changed = current.state != changed.state;
        let reopened = current.is_cancelled() && !changed.is_cancelled();
        let cancelled = changed.is_cancelled() && !current.is_cancelled();

        if !changed.is_cancelled() && (range_changed || reopened) {
            ConflictDetector::ensure_apartment_free(
                tx,
                changed.apartment_id,
                &changed.range,
                Some(changed.id),
            )?;
        }

        if range_changed && !current.is_cancelled() {
            ensure_turnover_after_checkout(tx, current, changed)?;
        }

        if !changed.is_cancelled() && (range_changed || reopened) {
            self.ensure_turnover_clear(tx, changed)?;
        }

        if state_changed && changed.state == BookingState::InProgress {
            if let Some(other) = tx
                .bookings_for_apartment(changed.apartment_id)?
                .into_iter()
                .find(|booking| booking.id != changed.id && booking.state == BookingState::InProgress)
            {
                return Err(SchedulingError::ExistsBookingAlreadyInProgress(other.id));
            }
        }

        if state_changed && current.state == BookingState::Finished {
            ensure_no_finished_turnover(tx, current)?;
        }

        if cancelled {
            ensure_removable(tx, current)?;
        } else if !changed.is_cancelled() && (state_changed || range_changed || reopened) {
            ensure_ordered_with_neighbours(tx, changed)?;
        }

        Ok(())
    }

    /// Regular work already scheduled around the stay may neither overlap it nor end
    /// after its preparation deadline. Work done well ahead of the stay is left alone.
    fn ensure_turnover_clear(&self, tx: &dyn StoreTx, booking: &Booking) -> Result<(), SchedulingError> {
        let preparation = preparation_window(tx, booking)?;
        let span = TimeRange::window(preparation.start, booking.range.end);
        for assignment in regular_assignments_in(tx, booking.apartment_id, &span)? {
            if assignment.range.overlaps(&booking.range) {
                return Err(SchedulingError::NotAvailableDates {
                    entity: EntityKind::Assignment,
                    id: assignment.id.0,
                });
            }
            let violation = self.prep_window.check(&assignment.range, booking.range.start);
            if violation == Some(PrepViolation::TooLate) {
                tracing::debug!(
                    booking_id = %booking.id,
                    assignment_id = %assignment.id,
                    "stay moved over scheduled turnover"
                );
                return Err(SchedulingError::AssignmentNotAtTimeToPrepareNextBooking(booking.id));
            }
        }
        Ok(())
    }
}

fn owned_apartment(
    tx: &dyn StoreTx,
    caller: &OwnerId,
    id: ApartmentId,
) -> Result<Apartment, SchedulingError> {
    let apartment = require(tx.apartment(id)?, EntityKind::Apartment, id.0)?;
    ensure_owner(&apartment.owner, caller, EntityKind::Apartment, id.0)?;
    Ok(apartment)
}

pub(crate) fn owned_booking(
    tx: &dyn StoreTx,
    caller: &OwnerId,
    id: BookingId,
) -> Result<Booking, SchedulingError> {
    let booking = require(tx.booking(id)?, EntityKind::Booking, id.0)?;
    ensure_owner(&booking.owner, caller, EntityKind::Booking, id.0)?;
    Ok(booking)
}

/// A later stay may only have started once the earlier one is no longer open.
fn out_of_order(earlier: &Booking, later: &Booking) -> bool {
    earlier.state.is_open() && later.state.has_started()
}

fn ensure_ordered_with_neighbours(tx: &dyn StoreTx, booking: &Booking) -> Result<(), SchedulingError> {
    let previous = tx.previous_booking(booking.apartment_id, booking.range.start, Some(booking.id))?;
    if let Some(previous) = previous {
        if out_of_order(&previous, booking) {
            return Err(SchedulingError::PreviousBookingNotFinished(previous.id));
        }
    }

    let next = tx.next_booking(booking.apartment_id, booking.range.start, Some(booking.id))?;
    if let Some(next) = next {
        if out_of_order(booking, &next) {
            return Err(SchedulingError::NextBookingAlreadyStarted(next.id));
        }
    }

    Ok(())
}

/// Removing `booking` from the sequence makes its neighbours adjacent.
fn ensure_bridge_is_ordered(tx: &dyn StoreTx, booking: &Booking) -> Result<(), SchedulingError> {
    let previous = tx.previous_booking(booking.apartment_id, booking.range.start, Some(booking.id))?;
    let next = tx.next_booking(booking.apartment_id, booking.range.start, Some(booking.id))?;
    match (previous, next) {
        (Some(previous), Some(next)) if out_of_order(&previous, &next) => {
            Err(SchedulingError::NextBookingAlreadyStarted(next.id))
        }
        _ => Ok(()),
    }
}

/// Regular assignments of the apartment starting inside `window`, ordered by start.
fn regular_assignments_in(
    tx: &dyn StoreTx,
    apartment_id: ApartmentId,
    window: &TimeRange,
) -> Result<Vec<Assignment>, SchedulingError> {
    let mut regular = Vec::new();
    for assignment in ConflictDetector::assignments_for_apartment(tx, apartment_id, window, None)? {
        if !window.contains(assignment.range.start) {
            continue;
        }
        if tx
            .task(assignment.task_id)?
            .is_some_and(|task| task.is_regular())
        {
            regular.push(assignment);
        }
    }
    Ok(regular)
}

fn turnover_assignments(
    tx: &dyn StoreTx,
    booking: &Booking,
) -> Result<Vec<Assignment>, SchedulingError> {
    let window = turnover_window(tx, booking)?;
    regular_assignments_in(tx, booking.apartment_id, &window)
}

/// Guards deleting or cancelling a live booking.
///
/// Its turnover window is absorbed by the previous stay, so pending work after it is
/// refused, and so is finished work that would leave a task twice in the merged window.
fn ensure_removable(tx: &dyn StoreTx, booking: &Booking) -> Result<(), SchedulingError> {
    let own = turnover_assignments(tx, booking)?;
    if let Some(pending) = own.iter().find(|assignment| !assignment.is_finished()) {
        return Err(SchedulingError::PendingTurnoverForBooking(pending.id));
    }

    ensure_bridge_is_ordered(tx, booking)?;

    let previous = tx.previous_booking(booking.apartment_id, booking.range.start, Some(booking.id))?;
    let merged_start = previous.map_or(NaiveDateTime::MIN, |previous| previous.range.end);
    let merged_end = turnover_window(tx, booking)?.end;
    let merged = TimeRange::window(merged_start, merged_end);

    let mut seen = HashSet::new();
    for assignment in regular_assignments_in(tx, booking.apartment_id, &merged)? {
        if !seen.insert(assignment.task_id) {
            return Err(SchedulingError::DuplicatedTaskForBooking(assignment.id));
        }
    }
    Ok(())
}

/// Leaving FINISHED is refused once turnover work after the stay has been completed.
fn ensure_no_finished_turnover(tx: &dyn StoreTx, booking: &Booking) -> Result<(), SchedulingError> {
    match turnover_assignments(tx, booking)?
        .into_iter()
        .find(|assignment| assignment.is_finished())
    {
        Some(finished) => Err(SchedulingError::AssignmentsFinishedForBooking(finished.id)),
        None => Ok(()),
    }
}

/// Moving checkout later must not leave scheduled turnover work inside the stay.
fn ensure_turnover_after_checkout(
    tx: &dyn StoreTx,
    current: &Booking,
    changed: &Booking,
) -> Result<(), SchedulingError> {
    if changed.range.end <= current.range.end {
        return Ok(());
    }
    let moved_over = TimeRange::window(current.range.end, changed.range.end);
    if turnover_assignments(tx, current)?
        .iter()
        .any(|assignment| moved_over.contains(assignment.range.start))
    {
        return Err(SchedulingError::AssignmentBeforeEndBooking(current.id));
    }
    Ok(())
}
