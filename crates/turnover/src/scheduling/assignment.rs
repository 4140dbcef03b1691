use chrono::NaiveDateTime;

use super::apartment_state::ApartmentStateEngine;
use super::booking::owned_booking;
use super::conflict::ConflictDetector;
use super::domain::{
    Assignment, AssignmentFilter, AssignmentId, AssignmentState, AssignmentUpdate, Booking,
    BookingId, BookingState, EntityKind, NewAssignment, NewExtraAssignment, OwnerId, Task, TaskId,
    WorkerId,
};
use super::error::SchedulingError;
use super::policy::PrepWindow;
use super::store::{ensure_owner, require, StoreTx};
use super::time_range::TimeRange;

/// Stay a regular assignment turns over and the stay it prepares for.
#[derive(Debug, Default)]
struct TurnoverContext {
    booking: Option<Booking>,
    next: Option<Booking>,
}

impl TurnoverContext {
    fn window(&self) -> TimeRange {
        TimeRange::window(
            self.booking
                .as_ref()
                .map_or(NaiveDateTime::MIN, |booking| booking.range.end),
            self.next
                .as_ref()
                .map_or(NaiveDateTime::MAX, |next| next.range.start),
        )
    }

    /// The window closes once the next guest has arrived.
    fn has_elapsed(&self, now: NaiveDateTime) -> Option<BookingId> {
        let booking = self.booking.as_ref()?;
        let next = self.next.as_ref()?;
        (next.range.start <= now).then_some(booking.id)
    }
}

/// Fully resolved assignment about to be written.
struct Candidate<'a> {
    task: &'a Task,
    worker_id: WorkerId,
    range: TimeRange,
    state: AssignmentState,
    exclude: Option<AssignmentId>,
}

/// Creates and changes assignments while keeping workers, apartments and turnover
/// windows consistent.
pub struct AssignmentScheduler {
    prep_window: PrepWindow,
    now: NaiveDateTime,
}

impl AssignmentScheduler {
    pub fn new(prep_window: PrepWindow, now: NaiveDateTime) -> Self {
        Self { prep_window, now }
    }

    pub fn create(
        &self,
        tx: &mut dyn StoreTx,
        caller: &OwnerId,
        request: NewAssignment,
    ) -> Result<Assignment, SchedulingError> {
        let task = owned_task(&*tx, caller, request.task_id)?;
        owned_worker(&*tx, caller, request.worker_id)?;
        let range = TimeRange::with_duration(request.start, task.duration())?;

        let candidate = Candidate {
            task: &task,
            worker_id: request.worker_id,
            range,
            state: request.state,
            exclude: None,
        };
        self.validate(&*tx, caller, &candidate, request.booking_id)?;
        self.insert(tx, caller, candidate)
    }

    /// Schedules an ad-hoc task over a caller-chosen interval.
    pub fn create_extra(
        &self,
        tx: &mut dyn StoreTx,
        caller: &OwnerId,
        request: NewExtraAssignment,
    ) -> Result<Assignment, SchedulingError> {
        let task = owned_task(&*tx, caller, request.task_id)?;
        if task.is_regular() {
            return Err(SchedulingError::TaskIsNotExtra(task.id.0));
        }
        owned_worker(&*tx, caller, request.worker_id)?;
        let range = TimeRange::new(request.start, request.end)?;

        let candidate = Candidate {
            task: &task,
            worker_id: request.worker_id,
            range,
            state: request.state,
            exclude: None,
        };
        self.validate(&*tx, caller, &candidate, None)?;
        self.insert(tx, caller, candidate)
    }

    pub fn get(
        &self,
        tx: &dyn StoreTx,
        caller: &OwnerId,
        id: AssignmentId,
    ) -> Result<Assignment, SchedulingError> {
        owned_assignment(tx, caller, id)
    }

    pub fn search(
        &self,
        tx: &dyn StoreTx,
        caller: &OwnerId,
        filter: &AssignmentFilter,
    ) -> Result<Vec<Assignment>, SchedulingError> {
        let mut assignments = tx.search_assignments(caller, filter)?;
        assignments.sort_by_key(|assignment| (assignment.range.start, assignment.id));
        Ok(assignments)
    }

    /// Applies a partial update.
    ///
    /// Schedule changes re-run the whole creation chain against the merged values and
    /// are refused once the stored assignment's turnover window has elapsed. A pure
    /// state change only runs the completion guard.
    pub fn update(
        &self,
        tx: &mut dyn StoreTx,
        caller: &OwnerId,
        update: AssignmentUpdate,
    ) -> Result<Assignment, SchedulingError> {
        let current = owned_assignment(&*tx, caller, update.id)?;
        let current_task = owned_task(&*tx, caller, current.task_id)?;

        if update.changes_schedule() && current_task.is_regular() {
            let context = self.context(&*tx, caller, &current_task, current.range.start, None)?;
            if let Some(booking_id) = context.has_elapsed(self.now) {
                return Err(SchedulingError::ChangeInAssignmentsOfPastBooking(booking_id));
            }
        }

        let task = match update.task_id {
            Some(task_id) if task_id != current_task.id => owned_task(&*tx, caller, task_id)?,
            _ => current_task.clone(),
        };
        let worker_id = update.worker_id.unwrap_or(current.worker_id);
        if worker_id != current.worker_id {
            owned_worker(&*tx, caller, worker_id)?;
        }
        let start = update.start.unwrap_or(current.range.start);
        let range = if task.is_regular() {
            TimeRange::with_duration(start, task.duration())?
        } else {
            match update.end {
                Some(end) => TimeRange::new(start, end)?,
                None => TimeRange::with_duration(start, current.range.duration())?,
            }
        };
        let state = update.state.unwrap_or(current.state);

        let candidate = Candidate {
            task: &task,
            worker_id,
            range,
            state,
            exclude: Some(current.id),
        };
        if update.changes_schedule() {
            self.validate(&*tx, caller, &candidate, update.booking_id)?;
        } else if state != current.state {
            let context = self.context(&*tx, caller, &task, range.start, None)?;
            ensure_completable(&candidate, &context)?;
        }

        let saved = tx.save_assignment(Assignment {
            id: current.id,
            task_id: task.id,
            worker_id,
            range: candidate.range,
            state,
            owner: current.owner,
        })?;

        let readiness = ApartmentStateEngine::recompute(tx, task.apartment_id)?;
        if current_task.apartment_id != task.apartment_id {
            ApartmentStateEngine::recompute(tx, current_task.apartment_id)?;
        }
        tracing::info!(
            assignment_id = %saved.id,
            task_id = %saved.task_id,
            worker_id = %saved.worker_id,
            state = saved.state.label(),
            ?readiness,
            "assignment updated"
        );
        Ok(saved)
    }

    pub fn set_state(
        &self,
        tx: &mut dyn StoreTx,
        caller: &OwnerId,
        id: AssignmentId,
        state: AssignmentState,
    ) -> Result<Assignment, SchedulingError> {
        self.update(tx, caller, AssignmentUpdate::state_only(id, state))
    }

    /// Removes an assignment. Completed turnover of an elapsed window is history and stays.
    pub fn delete(
        &self,
        tx: &mut dyn StoreTx,
        caller: &OwnerId,
        id: AssignmentId,
    ) -> Result<(), SchedulingError> {
        let assignment = owned_assignment(&*tx, caller, id)?;
        let task = require(tx.task(assignment.task_id)?, EntityKind::Task, assignment.task_id.0)?;

        if assignment.is_finished() && task.is_regular() {
            let context = self.context(&*tx, caller, &task, assignment.range.start, None)?;
            if let Some(booking_id) = context.has_elapsed(self.now) {
                return Err(SchedulingError::ChangeInAssignmentsOfPastBooking(booking_id));
            }
        }

        tx.delete_assignment(assignment.id)?;
        let readiness = ApartmentStateEngine::recompute(tx, task.apartment_id)?;
        tracing::info!(assignment_id = %assignment.id, apartment_id = %task.apartment_id, ?readiness, "assignment deleted");
        Ok(())
    }

    fn insert(
        &self,
        tx: &mut dyn StoreTx,
        caller: &OwnerId,
        candidate: Candidate<'_>,
    ) -> Result<Assignment, SchedulingError> {
        let id = AssignmentId(tx.allocate_id(EntityKind::Assignment)?);
        let saved = tx.save_assignment(Assignment {
            id,
            task_id: candidate.task.id,
            worker_id: candidate.worker_id,
            range: candidate.range,
            state: candidate.state,
            owner: caller.clone(),
        })?;

        let readiness = ApartmentStateEngine::recompute(tx, candidate.task.apartment_id)?;
        tracing::info!(
            assignment_id = %saved.id,
            task_id = %saved.task_id,
            worker_id = %saved.worker_id,
            extra = candidate.task.extra,
            ?readiness,
            "assignment created"
        );
        Ok(saved)
    }

    /// Resolves the stay being turned over. An explicit booking wins; otherwise it is the
    /// latest live booking starting at or before `start`.
    fn context(
        &self,
        tx: &dyn StoreTx,
        caller: &OwnerId,
        task: &Task,
        start: NaiveDateTime,
        booking_id: Option<BookingId>,
    ) -> Result<TurnoverContext, SchedulingError> {
        if task.extra {
            return Ok(TurnoverContext::default());
        }

        let booking = match booking_id {
            Some(booking_id) => {
                let booking = owned_booking(tx, caller, booking_id)?;
                if booking.apartment_id != task.apartment_id {
                    return Err(SchedulingError::BookingAndTaskNoMatchApartment {
                        booking: booking.id,
                        task: task.id.0,
                    });
                }
                Some(booking)
            }
            None => tx.previous_booking(task.apartment_id, start, None)?,
        };

        let next = match &booking {
            Some(booking) => tx.next_booking(task.apartment_id, booking.range.end, Some(booking.id))?,
            None => tx.next_booking(task.apartment_id, start, None)?,
        };

        Ok(TurnoverContext { booking, next })
    }

    fn validate(
        &self,
        tx: &dyn StoreTx,
        caller: &OwnerId,
        candidate: &Candidate<'_>,
        booking_id: Option<BookingId>,
    ) -> Result<(), SchedulingError> {
        let task = candidate.task;
        let context = self.context(tx, caller, task, candidate.range.start, booking_id)?;

        if task.is_regular() {
            if let Some(booking) = &context.booking {
                if booking.is_cancelled() {
                    return Err(SchedulingError::CancelledBooking(booking.id));
                }
                if candidate.range.start < booking.range.end {
                    return Err(SchedulingError::AssignmentBeforeEndBooking(booking.id));
                }
            }

            ensure_single_per_window(tx, candidate, &context.window())?;

            if let Some(next) = &context.next {
                self.ensure_in_prep_window(candidate, next)?;
            }

            ConflictDetector::ensure_apartment_free(
                tx,
                task.apartment_id,
                &candidate.range,
                None,
            )?;
        }

        ConflictDetector::ensure_worker_free(
            tx,
            candidate.worker_id,
            &candidate.range,
            candidate.exclude,
        )?;

        ensure_completable(candidate, &context)
    }

    fn ensure_in_prep_window(
        &self,
        candidate: &Candidate<'_>,
        next: &Booking,
    ) -> Result<(), SchedulingError> {
        if let Some(violation) = self.prep_window.check(&candidate.range, next.range.start) {
            tracing::debug!(
                task_id = %candidate.task.id,
                next_booking = %next.id,
                ?violation,
                "assignment outside preparation window"
            );
            return Err(SchedulingError::AssignmentNotAtTimeToPrepareNextBooking(next.id));
        }
        Ok(())
    }
}

/// One assignment per regular task and turnover window.
fn ensure_single_per_window(
    tx: &dyn StoreTx,
    candidate: &Candidate<'_>,
    window: &TimeRange,
) -> Result<(), SchedulingError> {
    let existing = tx
        .assignments_for_task(candidate.task.id)?
        .into_iter()
        .filter(|assignment| Some(assignment.id) != candidate.exclude)
        .filter(|assignment| window.contains(assignment.range.start))
        .min_by_key(|assignment| (assignment.range.start, assignment.id));

    match existing {
        Some(existing) => Err(SchedulingError::DuplicatedTaskForBooking(existing.id)),
        None => Ok(()),
    }
}

/// Regular turnover work can only be completed after the guest it follows has left.
fn ensure_completable(
    candidate: &Candidate<'_>,
    context: &TurnoverContext,
) -> Result<(), SchedulingError> {
    if candidate.state != AssignmentState::Finished || candidate.task.extra {
        return Ok(());
    }
    match &context.booking {
        Some(booking) if booking.state != BookingState::Finished => {
            Err(SchedulingError::CompleteTaskOnNotFinishedBooking(booking.id))
        }
        _ => Ok(()),
    }
}

fn owned_task(tx: &dyn StoreTx, caller: &OwnerId, id: TaskId) -> Result<Task, SchedulingError> {
    let task = require(tx.task(id)?, EntityKind::Task, id.0)?;
    ensure_owner(&task.owner, caller, EntityKind::Task, id.0)?;
    Ok(task)
}

fn owned_worker(tx: &dyn StoreTx, caller: &OwnerId, id: WorkerId) -> Result<(), SchedulingError> {
    let worker = require(tx.worker(id)?, EntityKind::Worker, id.0)?;
    ensure_owner(&worker.owner, caller, EntityKind::Worker, id.0)
}

fn owned_assignment(
    tx: &dyn StoreTx,
    caller: &OwnerId,
    id: AssignmentId,
) -> Result<Assignment, SchedulingError> {
    let assignment = require(tx.assignment(id)?, EntityKind::Assignment, id.0)?;
    ensure_owner(&assignment.owner, caller, EntityKind::Assignment, id.0)?;
    Ok(assignment)
}
