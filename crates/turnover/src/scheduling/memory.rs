use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDateTime;

use super::domain::{
    Apartment, ApartmentId, Assignment, AssignmentFilter, AssignmentId, Booking, BookingFilter,
    BookingId, BookingState, EntityKind, OwnerId, Task, TaskId, Worker, WorkerId,
};
use super::error::{RepositoryError, SchedulingError};
use super::store::{SchedulingStore, StoreTx};
use super::time_range::TimeRange;

#[derive(Debug, Clone, Default)]
struct StoreState {
    last_id: u64,
    apartments: BTreeMap<ApartmentId, Apartment>,
    bookings: BTreeMap<BookingId, Booking>,
    tasks: BTreeMap<TaskId, Task>,
    workers: BTreeMap<WorkerId, Worker>,
    assignments: BTreeMap<AssignmentId, Assignment>,
}

/// Process-local store. Transactions hold the lock for their whole duration and work
/// on a copy that is swapped in only when the work succeeds.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl SchedulingStore for InMemoryStore {
    fn transaction<T, F>(&self, work: F) -> Result<T, SchedulingError>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, SchedulingError>,
    {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))?;
        let mut working = guard.clone();
        let outcome = work(&mut working)?;
        *guard = working;
        Ok(outcome)
    }
}

impl InMemoryStore {
    fn with_state<T>(&self, read: impl FnOnce(&StoreState) -> T) -> T {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        read(&guard)
    }

    fn with_state_mut<T>(&self, write: impl FnOnce(&mut StoreState) -> T) -> T {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        write(&mut guard)
    }

    pub fn seed_apartment(&self, apartment: Apartment) {
        self.with_state_mut(|state| {
            state.last_id = state.last_id.max(apartment.id.0);
            state.apartments.insert(apartment.id, apartment);
        });
    }

    pub fn seed_booking(&self, booking: Booking) {
        self.with_state_mut(|state| {
            state.last_id = state.last_id.max(booking.id.0);
            state.bookings.insert(booking.id, booking);
        });
    }

    pub fn seed_task(&self, task: Task) {
        self.with_state_mut(|state| {
            state.last_id = state.last_id.max(task.id.0);
            state.tasks.insert(task.id, task);
        });
    }

    pub fn seed_worker(&self, worker: Worker) {
        self.with_state_mut(|state| {
            state.last_id = state.last_id.max(worker.id.0);
            state.workers.insert(worker.id, worker);
        });
    }

    pub fn seed_assignment(&self, assignment: Assignment) {
        self.with_state_mut(|state| {
            state.last_id = state.last_id.max(assignment.id.0);
            state.assignments.insert(assignment.id, assignment);
        });
    }

    pub fn apartment(&self, id: ApartmentId) -> Option<Apartment> {
        self.with_state(|state| state.apartments.get(&id).cloned())
    }

    pub fn booking(&self, id: BookingId) -> Option<Booking> {
        self.with_state(|state| state.bookings.get(&id).cloned())
    }

    pub fn assignment(&self, id: AssignmentId) -> Option<Assignment> {
        self.with_state(|state| state.assignments.get(&id).cloned())
    }

    pub fn bookings(&self) -> Vec<Booking> {
        self.with_state(|state| state.bookings.values().cloned().collect())
    }

    pub fn assignments(&self) -> Vec<Assignment> {
        self.with_state(|state| state.assignments.values().cloned().collect())
    }
}

impl StoreState {
    fn task_ids_for(&self, apartment_id: ApartmentId) -> BTreeSet<TaskId> {
        self.tasks
            .values()
            .filter(|task| task.apartment_id == apartment_id)
            .map(|task| task.id)
            .collect()
    }

    fn live_bookings(&self, apartment_id: ApartmentId) -> impl Iterator<Item = &Booking> {
        self.bookings.values().filter(move |booking| {
            booking.apartment_id == apartment_id && booking.state != BookingState::Cancelled
        })
    }
}

impl StoreTx for StoreState {
    fn allocate_id(&mut self, _kind: EntityKind) -> Result<u64, RepositoryError> {
        self.last_id += 1;
        Ok(self.last_id)
    }

    fn apartment(&self, id: ApartmentId) -> Result<Option<Apartment>, RepositoryError> {
        Ok(self.apartments.get(&id).cloned())
    }

    fn save_apartment(&mut self, apartment: Apartment) -> Result<Apartment, RepositoryError> {
        self.apartments.insert(apartment.id, apartment.clone());
        Ok(apartment)
    }

    fn apartments_for_owner(&self, owner: &OwnerId) -> Result<Vec<Apartment>, RepositoryError> {
        Ok(self
            .apartments
            .values()
            .filter(|apartment| &apartment.owner == owner)
            .cloned()
            .collect())
    }

    fn booking(&self, id: BookingId) -> Result<Option<Booking>, RepositoryError> {
        Ok(self.bookings.get(&id).cloned())
    }

    fn save_booking(&mut self, booking: Booking) -> Result<Booking, RepositoryError> {
        self.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    fn delete_booking(&mut self, id: BookingId) -> Result<(), RepositoryError> {
        self.bookings
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn bookings_overlapping(
        &self,
        apartment_id: ApartmentId,
        range: &TimeRange,
        exclude: Option<BookingId>,
    ) -> Result<Vec<Booking>, RepositoryError> {
        Ok(self
            .bookings
            .values()
            .filter(|booking| booking.apartment_id == apartment_id)
            .filter(|booking| Some(booking.id) != exclude)
            .filter(|booking| booking.range.overlaps(range))
            .cloned()
            .collect())
    }

    fn bookings_for_apartment(
        &self,
        apartment_id: ApartmentId,
    ) -> Result<Vec<Booking>, RepositoryError> {
        Ok(self
            .bookings
            .values()
            .filter(|booking| booking.apartment_id == apartment_id)
            .cloned()
            .collect())
    }

    fn latest_finished_booking(
        &self,
        apartment_id: ApartmentId,
    ) -> Result<Option<Booking>, RepositoryError> {
        Ok(self
            .live_bookings(apartment_id)
            .filter(|booking| booking.state == BookingState::Finished)
            .max_by_key(|booking| (booking.range.end, booking.id))
            .cloned())
    }

    fn next_booking(
        &self,
        apartment_id: ApartmentId,
        after: NaiveDateTime,
        exclude: Option<BookingId>,
    ) -> Result<Option<Booking>, RepositoryError> {
        Ok(self
            .live_bookings(apartment_id)
            .filter(|booking| Some(booking.id) != exclude)
            .filter(|booking| booking.range.start >= after)
            .min_by_key(|booking| (booking.range.start, booking.id))
            .cloned())
    }

    fn previous_booking(
        &self,
        apartment_id: ApartmentId,
        before: NaiveDateTime,
        exclude: Option<BookingId>,
    ) -> Result<Option<Booking>, RepositoryError> {
        Ok(self
            .live_bookings(apartment_id)
            .filter(|booking| Some(booking.id) != exclude)
            .filter(|booking| booking.range.start <= before)
            .max_by_key(|booking| (booking.range.start, booking.id))
            .cloned())
    }

    fn search_bookings(
        &self,
        owner: &OwnerId,
        filter: &BookingFilter,
    ) -> Result<Vec<Booking>, RepositoryError> {
        Ok(self
            .bookings
            .values()
            .filter(|booking| &booking.owner == owner && filter.matches(booking))
            .cloned()
            .collect())
    }

    fn task(&self, id: TaskId) -> Result<Option<Task>, RepositoryError> {
        Ok(self.tasks.get(&id).cloned())
    }

    fn tasks_for_apartment(&self, apartment_id: ApartmentId) -> Result<Vec<Task>, RepositoryError> {
        Ok(self
            .tasks
            .values()
            .filter(|task| task.apartment_id == apartment_id)
            .cloned()
            .collect())
    }

    fn worker(&self, id: WorkerId) -> Result<Option<Worker>, RepositoryError> {
        Ok(self.workers.get(&id).cloned())
    }

    fn assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, RepositoryError> {
        Ok(self.assignments.get(&id).cloned())
    }

    fn save_assignment(&mut self, assignment: Assignment) -> Result<Assignment, RepositoryError> {
        self.assignments.insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    fn delete_assignment(&mut self, id: AssignmentId) -> Result<(), RepositoryError> {
        self.assignments
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn worker_assignments_overlapping(
        &self,
        worker_id: WorkerId,
        range: &TimeRange,
        exclude: Option<AssignmentId>,
    ) -> Result<Vec<Assignment>, RepositoryError> {
        Ok(self
            .assignments
            .values()
            .filter(|assignment| assignment.worker_id == worker_id)
            .filter(|assignment| Some(assignment.id) != exclude)
            .filter(|assignment| assignment.range.overlaps(range))
            .cloned()
            .collect())
    }

    fn apartment_assignments_overlapping(
        &self,
        apartment_id: ApartmentId,
        range: &TimeRange,
        exclude: Option<AssignmentId>,
    ) -> Result<Vec<Assignment>, RepositoryError> {
        let task_ids = self.task_ids_for(apartment_id);
        Ok(self
            .assignments
            .values()
            .filter(|assignment| task_ids.contains(&assignment.task_id))
            .filter(|assignment| Some(assignment.id) != exclude)
            .filter(|assignment| assignment.range.overlaps(range))
            .cloned()
            .collect())
    }

    fn assignments_for_task(&self, task_id: TaskId) -> Result<Vec<Assignment>, RepositoryError> {
        Ok(self
            .assignments
            .values()
            .filter(|assignment| assignment.task_id == task_id)
            .cloned()
            .collect())
    }

    fn search_assignments(
        &self,
        owner: &OwnerId,
        filter: &AssignmentFilter,
    ) -> Result<Vec<Assignment>, RepositoryError> {
        Ok(self
            .assignments
            .values()
            .filter(|assignment| &assignment.owner == owner)
            .filter(|assignment| {
                let apartment_id = self
                    .tasks
                    .get(&assignment.task_id)
                    .map(|task| task.apartment_id);
                filter.matches(assignment, apartment_id)
            })
            .cloned()
            .collect())
    }
}
