use std::io::Read;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};

use super::alerts::{SchedulerWindow, TurnoverAlertComputer};
use super::assignment::AssignmentScheduler;
use super::booking::BookingLifecycle;
use super::domain::{
    Assignment, AssignmentFilter, AssignmentId, AssignmentState, AssignmentUpdate, Booking,
    BookingFilter, BookingId, BookingSource, BookingState, BookingUpdate, ImportedBooking,
    NewAssignment, NewBooking, NewExtraAssignment, OwnerId,
};
use super::error::{ErrorKind, SchedulingError};
use super::import::{parse_export, ImportError, ImportReconciler, StayTimes};
use super::policy::SchedulingPolicy;
use super::store::{Clock, SchedulingStore, StoreTx};
use super::time_range::TimeRange;

/// Transactional facade over the scheduling components.
///
/// Every operation runs inside exactly one store transaction, including the readiness
/// recompute it triggers, so a failure anywhere rolls the whole operation back.
pub struct TurnoverService<S, C> {
    store: Arc<S>,
    clock: Arc<C>,
    policy: SchedulingPolicy,
}

impl<S, C> TurnoverService<S, C>
where
    S: SchedulingStore + 'static,
    C: Clock + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<C>, policy: SchedulingPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &SchedulingPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn create_booking(
        &self,
        caller: &OwnerId,
        request: NewBooking,
    ) -> Result<Booking, SchedulingError> {
        let lifecycle = self.lifecycle();
        self.run("booking.create", |tx| {
            lifecycle.create(tx, caller, request)
        })
    }

    pub fn update_booking(
        &self,
        caller: &OwnerId,
        update: BookingUpdate,
    ) -> Result<Booking, SchedulingError> {
        let lifecycle = self.lifecycle();
        self.run("booking.update", |tx| {
            lifecycle.update(tx, caller, update)
        })
    }

    pub fn set_booking_state(
        &self,
        caller: &OwnerId,
        id: BookingId,
        state: BookingState,
    ) -> Result<Booking, SchedulingError> {
        let lifecycle = self.lifecycle();
        self.run("booking.set_state", |tx| {
            lifecycle.set_state(tx, caller, id, state)
        })
    }

    pub fn delete_booking(&self, caller: &OwnerId, id: BookingId) -> Result<(), SchedulingError> {
        let lifecycle = self.lifecycle();
        self.run("booking.delete", |tx| lifecycle.delete(tx, caller, id))
    }

    pub fn get_booking(&self, caller: &OwnerId, id: BookingId) -> Result<Booking, SchedulingError> {
        let lifecycle = self.lifecycle();
        self.run("booking.get", |tx| lifecycle.get(&*tx, caller, id))
    }

    pub fn search_bookings(
        &self,
        caller: &OwnerId,
        filter: &BookingFilter,
    ) -> Result<Vec<Booking>, SchedulingError> {
        let lifecycle = self.lifecycle();
        self.run("booking.search", |tx| {
            lifecycle.search(&*tx, caller, filter)
        })
    }

    pub fn create_assignment(
        &self,
        caller: &OwnerId,
        request: NewAssignment,
    ) -> Result<Assignment, SchedulingError> {
        let scheduler = self.scheduler();
        self.run("assignment.create", |tx| scheduler.create(tx, caller, request))
    }

    pub fn create_extra_assignment(
        &self,
        caller: &OwnerId,
        request: NewExtraAssignment,
    ) -> Result<Assignment, SchedulingError> {
        let scheduler = self.scheduler();
        self.run("assignment.create_extra", |tx| {
            scheduler.create_extra(tx, caller, request)
        })
    }

    pub fn update_assignment(
        &self,
        caller: &OwnerId,
        update: AssignmentUpdate,
    ) -> Result<Assignment, SchedulingError> {
        let scheduler = self.scheduler();
        self.run("assignment.update", |tx| scheduler.update(tx, caller, update))
    }

    pub fn set_assignment_state(
        &self,
        caller: &OwnerId,
        id: AssignmentId,
        state: AssignmentState,
    ) -> Result<Assignment, SchedulingError> {
        let scheduler = self.scheduler();
        self.run("assignment.set_state", |tx| {
            scheduler.set_state(tx, caller, id, state)
        })
    }

    pub fn delete_assignment(
        &self,
        caller: &OwnerId,
        id: AssignmentId,
    ) -> Result<(), SchedulingError> {
        let scheduler = self.scheduler();
        self.run("assignment.delete", |tx| scheduler.delete(tx, caller, id))
    }

    pub fn get_assignment(
        &self,
        caller: &OwnerId,
        id: AssignmentId,
    ) -> Result<Assignment, SchedulingError> {
        let scheduler = self.scheduler();
        self.run("assignment.get", |tx| scheduler.get(&*tx, caller, id))
    }

    pub fn search_assignments(
        &self,
        caller: &OwnerId,
        filter: &AssignmentFilter,
    ) -> Result<Vec<Assignment>, SchedulingError> {
        let scheduler = self.scheduler();
        self.run("assignment.search", |tx| {
            scheduler.search(&*tx, caller, filter)
        })
    }

    /// Board for the configured number of days starting at midnight of `start`.
    pub fn scheduler_window(
        &self,
        caller: &OwnerId,
        start: NaiveDate,
    ) -> Result<SchedulerWindow, SchedulingError> {
        let start = start.and_time(NaiveTime::MIN);
        let range = TimeRange::with_duration(start, Duration::days(self.policy.scheduler_window_days))?;
        self.compute_alerts(caller, &range)
    }

    pub fn compute_alerts(
        &self,
        caller: &OwnerId,
        range: &TimeRange,
    ) -> Result<SchedulerWindow, SchedulingError> {
        let computer = TurnoverAlertComputer::new(self.policy.alerts, self.clock.now());
        self.run("scheduler.window", |tx| computer.compute(&*tx, caller, range))
    }

    /// Parses a channel export and reconciles it against stored data without persisting.
    pub fn import_bookings<R: Read>(
        &self,
        caller: &OwnerId,
        source: BookingSource,
        reader: R,
    ) -> Result<Vec<ImportedBooking>, ImportError> {
        let times = StayTimes {
            check_in: self.policy.check_in_time,
            check_out: self.policy.check_out_time,
        };
        let candidates = parse_export(source, reader, times).inspect_err(|err| {
            tracing::warn!(operation = "booking.import", source = source.label(), error = %err, "booking export rejected");
        })?;

        let reconciled = self.run("booking.import", |tx| {
            ImportReconciler::reconcile(&*tx, caller, candidates)
        })?;
        Ok(reconciled)
    }

    fn lifecycle(&self) -> BookingLifecycle {
        BookingLifecycle::new(self.policy.prep_window)
    }

    fn scheduler(&self) -> AssignmentScheduler {
        AssignmentScheduler::new(self.policy.prep_window, self.clock.now())
    }

    fn run<T, F>(&self, operation: &'static str, work: F) -> Result<T, SchedulingError>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, SchedulingError>,
    {
        self.store.transaction(work).inspect_err(|err| {
            if err.kind() == ErrorKind::Internal {
                tracing::error!(operation, error = %err, "scheduling operation failed");
            } else {
                tracing::warn!(operation, code = err.code(), error = %err, "scheduling operation rejected");
            }
        })
    }
}
