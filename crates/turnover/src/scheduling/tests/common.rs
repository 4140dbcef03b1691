use std::sync::Arc;

use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::scheduling::domain::{
    Apartment, ApartmentId, Booking, BookingId, BookingSource, BookingState, ExternalRef,
    NewAssignment, NewBooking, OwnerId, Readiness, Task, TaskId, Worker, WorkerId,
};
use crate::scheduling::error::{RepositoryError, SchedulingError};
use crate::scheduling::memory::InMemoryStore;
use crate::scheduling::policy::SchedulingPolicy;
use crate::scheduling::service::TurnoverService;
use crate::scheduling::store::{FixedClock, SchedulingStore, StoreTx};
use crate::scheduling::time_range::TimeRange;

pub(super) const APARTMENT: ApartmentId = ApartmentId(1);
pub(super) const SECOND_APARTMENT: ApartmentId = ApartmentId(2);
pub(super) const FOREIGN_APARTMENT: ApartmentId = ApartmentId(3);

/// Regular two hour clean of [`APARTMENT`].
pub(super) const CLEANING: TaskId = TaskId(10);
/// Regular clean of [`SECOND_APARTMENT`].
pub(super) const SECOND_CLEANING: TaskId = TaskId(11);
/// Ad-hoc repair on [`APARTMENT`], 90 minutes.
pub(super) const REPAIR: TaskId = TaskId(12);

pub(super) const ALICE: WorkerId = WorkerId(20);
pub(super) const BOB: WorkerId = WorkerId(21);
pub(super) const FOREIGN_WORKER: WorkerId = WorkerId(22);

pub(super) type TestService = TurnoverService<InMemoryStore, FixedClock>;

pub(super) struct Fixture {
    pub(super) store: Arc<InMemoryStore>,
    pub(super) service: TestService,
}

pub(super) fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, month, day)
        .expect("valid date")
        .and_hms_opt(hour, 0, 0)
        .expect("valid time")
}

pub(super) fn at_minute(month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, month, day)
        .expect("valid date")
        .and_hms_opt(hour, minute, 0)
        .expect("valid time")
}

/// Tuesday morning the tests pretend it is.
pub(super) fn now() -> NaiveDateTime {
    at(6, 10, 9)
}

pub(super) fn owner() -> OwnerId {
    OwnerId("host-1".to_string())
}

pub(super) fn intruder() -> OwnerId {
    OwnerId("host-2".to_string())
}

pub(super) fn fixture() -> Fixture {
    fixture_with(now(), SchedulingPolicy::default())
}

pub(super) fn fixture_with(now: NaiveDateTime, policy: SchedulingPolicy) -> Fixture {
    let store = Arc::new(InMemoryStore::default());
    seed_catalog(&store);
    let service = TurnoverService::new(store.clone(), Arc::new(FixedClock(now)), policy);
    Fixture { store, service }
}

fn seed_catalog(store: &InMemoryStore) {
    for (id, name, owner, external_refs) in [
        (
            APARTMENT,
            "Harbour Loft",
            owner(),
            vec![
                ExternalRef {
                    source: BookingSource::Airbnb,
                    reference: "4411".to_string(),
                },
                ExternalRef {
                    source: BookingSource::BookingCom,
                    reference: "HL-7".to_string(),
                },
            ],
        ),
        (SECOND_APARTMENT, "Garden Studio", owner(), Vec::new()),
        (
            FOREIGN_APARTMENT,
            "Someone Else's Flat",
            intruder(),
            vec![ExternalRef {
                source: BookingSource::Airbnb,
                reference: "4411".to_string(),
            }],
        ),
    ] {
        store.seed_apartment(Apartment {
            id,
            name: name.to_string(),
            external_refs,
            address: format!("{name} street 1"),
            readiness: Readiness::Ready,
            visible: true,
            owner,
        });
    }

    for (id, apartment_id, name, minutes, extra) in [
        (CLEANING, APARTMENT, "Turnover clean", 120, false),
        (SECOND_CLEANING, SECOND_APARTMENT, "Turnover clean", 120, false),
        (REPAIR, APARTMENT, "Fix dripping tap", 90, true),
    ] {
        store.seed_task(Task {
            id,
            apartment_id,
            name: name.to_string(),
            category: if extra { "maintenance" } else { "cleaning" }.to_string(),
            duration_minutes: minutes,
            extra,
            steps: vec!["Strip beds".to_string(), "Restock linen".to_string()],
            owner: owner(),
        });
    }

    for (id, name, owner) in [
        (ALICE, "Alice", owner()),
        (BOB, "Bob", owner()),
        (FOREIGN_WORKER, "Mallory", intruder()),
    ] {
        store.seed_worker(Worker {
            id,
            name: name.to_string(),
            language: "en".to_string(),
            salary_cents: 1_800,
            visible: true,
            owner,
        });
    }
}

/// Writes a booking straight into the store, bypassing lifecycle checks.
pub(super) fn seed_booking(
    store: &InMemoryStore,
    id: u64,
    apartment_id: ApartmentId,
    start: NaiveDateTime,
    end: NaiveDateTime,
    state: BookingState,
) -> BookingId {
    let id = BookingId(id);
    store.seed_booking(Booking {
        id,
        apartment_id,
        range: TimeRange::new(start, end).expect("valid range"),
        name: format!("guest {id}"),
        price_cents: 45_000,
        paid: true,
        state,
        source: BookingSource::None,
        owner: owner(),
    });
    id
}

pub(super) fn new_booking(start: NaiveDateTime, end: NaiveDateTime) -> NewBooking {
    NewBooking {
        apartment_id: APARTMENT,
        start,
        end,
        name: "Dana Smith".to_string(),
        price_cents: 52_000,
        paid: false,
        source: BookingSource::None,
    }
}

pub(super) fn new_assignment(task_id: TaskId, worker_id: WorkerId, start: NaiveDateTime) -> NewAssignment {
    NewAssignment {
        task_id,
        worker_id,
        start,
        booking_id: None,
        state: Default::default(),
    }
}

pub(super) fn readiness(store: &InMemoryStore, apartment_id: ApartmentId) -> Readiness {
    store
        .apartment(apartment_id)
        .expect("apartment seeded")
        .readiness
}

/// Store whose every transaction fails as if the database were offline.
pub(super) struct UnavailableStore;

impl SchedulingStore for UnavailableStore {
    fn transaction<T, F>(&self, _work: F) -> Result<T, SchedulingError>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, SchedulingError>,
    {
        Err(RepositoryError::Unavailable("database offline".to_string()).into())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
