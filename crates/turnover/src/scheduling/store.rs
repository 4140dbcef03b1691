use chrono::{Local, NaiveDateTime};

use super::domain::{
    Apartment, ApartmentId, Assignment, AssignmentFilter, AssignmentId, Booking, BookingFilter,
    BookingId, EntityKind, OwnerId, Task, TaskId, Worker, WorkerId,
};
use super::error::{RepositoryError, SchedulingError};
use super::time_range::TimeRange;

/// Reads and writes available inside one store transaction.
///
/// Overlap queries return raw matches; filtering cancelled rows and ordering is the
/// caller's concern.
pub trait StoreTx {
    fn allocate_id(&mut self, kind: EntityKind) -> Result<u64, RepositoryError>;

    fn apartment(&self, id: ApartmentId) -> Result<Option<Apartment>, RepositoryError>;
    fn save_apartment(&mut self, apartment: Apartment) -> Result<Apartment, RepositoryError>;
    fn apartments_for_owner(&self, owner: &OwnerId) -> Result<Vec<Apartment>, RepositoryError>;

    fn booking(&self, id: BookingId) -> Result<Option<Booking>, RepositoryError>;
    fn save_booking(&mut self, booking: Booking) -> Result<Booking, RepositoryError>;
    fn delete_booking(&mut self, id: BookingId) -> Result<(), RepositoryError>;
    /// Bookings of the apartment overlapping `range`, minus `exclude`.
    fn bookings_overlapping(
        &self,
        apartment_id: ApartmentId,
        range: &TimeRange,
        exclude: Option<BookingId>,
    ) -> Result<Vec<Booking>, RepositoryError>;
    fn bookings_for_apartment(
        &self,
        apartment_id: ApartmentId,
    ) -> Result<Vec<Booking>, RepositoryError>;
    /// Finished booking of the apartment with the latest end.
    fn latest_finished_booking(
        &self,
        apartment_id: ApartmentId,
    ) -> Result<Option<Booking>, RepositoryError>;
    /// Earliest non-cancelled booking starting at or after `after`, minus `exclude`.
    fn next_booking(
        &self,
        apartment_id: ApartmentId,
        after: NaiveDateTime,
        exclude: Option<BookingId>,
    ) -> Result<Option<Booking>, RepositoryError>;
    /// Latest non-cancelled booking starting at or before `before`, minus `exclude`.
    fn previous_booking(
        &self,
        apartment_id: ApartmentId,
        before: NaiveDateTime,
        exclude: Option<BookingId>,
    ) -> Result<Option<Booking>, RepositoryError>;
    fn search_bookings(
        &self,
        owner: &OwnerId,
        filter: &BookingFilter,
    ) -> Result<Vec<Booking>, RepositoryError>;

    fn task(&self, id: TaskId) -> Result<Option<Task>, RepositoryError>;
    fn tasks_for_apartment(&self, apartment_id: ApartmentId) -> Result<Vec<Task>, RepositoryError>;

    fn worker(&self, id: WorkerId) -> Result<Option<Worker>, RepositoryError>;

    fn assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, RepositoryError>;
    fn save_assignment(&mut self, assignment: Assignment) -> Result<Assignment, RepositoryError>;
    fn delete_assignment(&mut self, id: AssignmentId) -> Result<(), RepositoryError>;
    /// Assignments of the worker overlapping `range`, minus `exclude`.
    fn worker_assignments_overlapping(
        &self,
        worker_id: WorkerId,
        range: &TimeRange,
        exclude: Option<AssignmentId>,
    ) -> Result<Vec<Assignment>, RepositoryError>;
    /// Assignments of any task of the apartment overlapping `range`, minus `exclude`.
    fn apartment_assignments_overlapping(
        &self,
        apartment_id: ApartmentId,
        range: &TimeRange,
        exclude: Option<AssignmentId>,
    ) -> Result<Vec<Assignment>, RepositoryError>;
    fn assignments_for_task(&self, task_id: TaskId) -> Result<Vec<Assignment>, RepositoryError>;
    fn search_assignments(
        &self,
        owner: &OwnerId,
        filter: &AssignmentFilter,
    ) -> Result<Vec<Assignment>, RepositoryError>;
}

/// Transactional storage collaborator.
///
/// `transaction` must run `work` with serializable isolation over everything it reads
/// and must discard every write when `work` returns an error.
pub trait SchedulingStore: Send + Sync {
    fn transaction<T, F>(&self, work: F) -> Result<T, SchedulingError>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, SchedulingError>;
}

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Entity lookup that turns a missing row into a typed `NotFound`.
pub(crate) fn require<T>(
    found: Option<T>,
    entity: EntityKind,
    id: u64,
) -> Result<T, SchedulingError> {
    found.ok_or_else(|| SchedulingError::not_found(entity, id))
}

/// Ownership check applied to every entity an operation touches.
pub(crate) fn ensure_owner(
    owner: &OwnerId,
    caller: &OwnerId,
    entity: EntityKind,
    id: u64,
) -> Result<(), SchedulingError> {
    if owner == caller {
        Ok(())
    } else {
        Err(SchedulingError::Forbidden { entity, id })
    }
}
