use std::sync::Arc;
use std::thread;

use chrono::{NaiveDate, NaiveDateTime};
use turnover::scheduling::{
    Apartment, ApartmentId, AssignmentState, BookingState, EntityKind, FixedClock, InMemoryStore,
    NewAssignment, NewBooking, OwnerId, Readiness, SchedulingError, SchedulingPolicy, Task,
    TaskId, TurnoverService, Worker, WorkerId,
};

const LOFT: ApartmentId = ApartmentId(1);
const CLEAN: TaskId = TaskId(2);
const MARTA: WorkerId = WorkerId(3);

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 9, day)
        .expect("valid date")
        .and_hms_opt(hour, 0, 0)
        .expect("valid time")
}

fn host() -> OwnerId {
    OwnerId("host".to_string())
}

fn portfolio() -> (Arc<InMemoryStore>, Arc<TurnoverService<InMemoryStore, FixedClock>>) {
    let store = Arc::new(InMemoryStore::default());
    store.seed_apartment(Apartment {
        id: LOFT,
        name: "Loft".to_string(),
        external_refs: Vec::new(),
        address: "Quay Street 4".to_string(),
        readiness: Readiness::Ready,
        visible: true,
        owner: host(),
    });
    store.seed_task(Task {
        id: CLEAN,
        apartment_id: LOFT,
        name: "Turnover clean".to_string(),
        category: "cleaning".to_string(),
        duration_minutes: 150,
        extra: false,
        steps: vec!["Linen".to_string(), "Kitchen".to_string(), "Bathroom".to_string()],
        owner: host(),
    });
    store.seed_worker(Worker {
        id: MARTA,
        name: "Marta".to_string(),
        language: "pl".to_string(),
        salary_cents: 1_700,
        visible: true,
        owner: host(),
    });
    let service = Arc::new(TurnoverService::new(
        store.clone(),
        Arc::new(FixedClock(at(1, 8))),
        SchedulingPolicy::default(),
    ));
    (store, service)
}

fn stay(start: NaiveDateTime, end: NaiveDateTime) -> NewBooking {
    NewBooking {
        apartment_id: LOFT,
        start,
        end,
        name: "Guest".to_string(),
        price_cents: 60_000,
        paid: true,
        source: Default::default(),
    }
}

#[test]
fn a_full_turnover_cycle_moves_readiness_through_every_state() {
    let (store, service) = portfolio();
    let first = service
        .create_booking(&host(), stay(at(2, 15), at(5, 11)))
        .expect("first stay");
    let second = service
        .create_booking(&host(), stay(at(6, 15), at(8, 11)))
        .expect("second stay");

    service
        .set_booking_state(&host(), first.id, BookingState::InProgress)
        .expect("check in");
    assert_eq!(store.apartment(LOFT).map(|a| a.readiness), Some(Readiness::Occupied));

    service
        .set_booking_state(&host(), first.id, BookingState::Finished)
        .expect("check out");
    assert_eq!(store.apartment(LOFT).map(|a| a.readiness), Some(Readiness::Used));

    let clean = service
        .create_assignment(
            &host(),
            NewAssignment {
                task_id: CLEAN,
                worker_id: MARTA,
                start: at(5, 12),
                booking_id: Some(first.id),
                state: AssignmentState::Pending,
            },
        )
        .expect("turnover scheduled");
    assert_eq!(clean.range.end, at(5, 14) + chrono::Duration::minutes(30));

    service
        .set_assignment_state(&host(), clean.id, AssignmentState::Finished)
        .expect("turnover done");
    assert_eq!(store.apartment(LOFT).map(|a| a.readiness), Some(Readiness::Ready));

    service
        .set_booking_state(&host(), second.id, BookingState::InProgress)
        .expect("next guest arrives");
    assert_eq!(store.apartment(LOFT).map(|a| a.readiness), Some(Readiness::Occupied));
}

#[test]
fn rejected_operations_leave_no_partial_writes() {
    let (store, service) = portfolio();
    let first = service
        .create_booking(&host(), stay(at(2, 15), at(5, 11)))
        .expect("first stay");
    let bookings = store.bookings();
    let apartment = store.apartment(LOFT);

    let err = service
        .create_booking(&host(), stay(at(4, 15), at(6, 11)))
        .expect_err("overlap rejected");
    assert!(matches!(
        err,
        SchedulingError::NotAvailableDates {
            entity: EntityKind::Booking,
            id
        } if id == first.id.0
    ));
    assert_eq!(store.bookings(), bookings);
    assert_eq!(store.apartment(LOFT), apartment);
}

#[test]
fn concurrent_overlapping_bookings_admit_exactly_one() {
    let (store, service) = portfolio();

    let handles: Vec<_> = (0..8)
        .map(|offset| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                service.create_booking(&host(), stay(at(10, 15 - offset), at(12, 11)))
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread completes"))
        .filter(Result::is_ok)
        .count();

    assert_eq!(successes, 1);
    assert_eq!(store.bookings().len(), 1);
}
