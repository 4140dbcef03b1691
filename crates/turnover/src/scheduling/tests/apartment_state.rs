use chrono::{NaiveDate, NaiveDateTime};

use super::common::*;

use crate::scheduling::apartment_state::ApartmentStateEngine;
use crate::scheduling::domain::{
    ApartmentId, Assignment, AssignmentId, AssignmentState, BookingState, Readiness, TaskId,
};
use crate::scheduling::error::SchedulingError;
use crate::scheduling::memory::InMemoryStore;
use crate::scheduling::policy::SchedulingPolicy;
use crate::scheduling::store::SchedulingStore;
use crate::scheduling::time_range::TimeRange;

fn january(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, day)
        .expect("valid date")
        .and_hms_opt(hour, 0, 0)
        .expect("valid time")
}

fn derive(store: &InMemoryStore, apartment_id: ApartmentId) -> Readiness {
    store
        .transaction(|tx| ApartmentStateEngine::derive(&*tx, apartment_id).map_err(SchedulingError::from))
        .expect("derive readiness")
}

fn recompute(store: &InMemoryStore, apartment_id: ApartmentId) -> Readiness {
    store
        .transaction(|tx| ApartmentStateEngine::recompute(tx, apartment_id))
        .expect("recompute readiness")
}

fn seed_clean(store: &InMemoryStore, id: u64, task_id: TaskId, start: NaiveDateTime, state: AssignmentState) {
    store.seed_assignment(Assignment {
        id: AssignmentId(id),
        task_id,
        worker_id: ALICE,
        range: TimeRange::with_duration(start, chrono::Duration::hours(2)).expect("valid range"),
        state,
        owner: owner(),
    });
}

#[test]
fn apartment_without_stays_is_ready() {
    let Fixture { store, .. } = fixture();
    assert_eq!(derive(&store, APARTMENT), Readiness::Ready);
}

#[test]
fn guest_in_house_means_occupied() {
    let Fixture { store, .. } = fixture();
    seed_booking(&store, 100, APARTMENT, january(5, 15), january(10, 11), BookingState::Finished);
    seed_booking(&store, 101, APARTMENT, january(12, 15), january(25, 11), BookingState::InProgress);
    assert_eq!(derive(&store, APARTMENT), Readiness::Occupied);
}

#[test]
fn finished_stay_needs_finished_turnover() {
    let Fixture { store, .. } = fixture_with(january(20, 9), SchedulingPolicy::default());
    seed_booking(&store, 100, APARTMENT, january(5, 15), january(10, 11), BookingState::Finished);
    assert_eq!(derive(&store, APARTMENT), Readiness::Used);

    seed_clean(&store, 200, CLEANING, january(11, 10), AssignmentState::Pending);
    assert_eq!(derive(&store, APARTMENT), Readiness::Used);

    seed_clean(&store, 200, CLEANING, january(11, 10), AssignmentState::Finished);
    assert_eq!(derive(&store, APARTMENT), Readiness::Ready);
}

#[test]
fn ad_hoc_work_does_not_turn_an_apartment_over() {
    let Fixture { store, .. } = fixture();
    seed_booking(&store, 100, APARTMENT, january(5, 15), january(10, 11), BookingState::Finished);
    seed_clean(&store, 200, REPAIR, january(11, 10), AssignmentState::Finished);
    assert_eq!(derive(&store, APARTMENT), Readiness::Used);
}

#[test]
fn only_the_latest_finished_stay_counts() {
    let Fixture { store, .. } = fixture();
    seed_booking(&store, 100, APARTMENT, january(1, 15), january(3, 11), BookingState::Finished);
    seed_booking(&store, 101, APARTMENT, january(5, 15), january(8, 11), BookingState::Finished);

    seed_clean(&store, 200, CLEANING, january(3, 12), AssignmentState::Finished);
    assert_eq!(derive(&store, APARTMENT), Readiness::Used);

    seed_clean(&store, 201, CLEANING, january(8, 12), AssignmentState::Finished);
    assert_eq!(derive(&store, APARTMENT), Readiness::Ready);
}

#[test]
fn cancelled_stays_are_ignored() {
    let Fixture { store, .. } = fixture();
    seed_booking(&store, 100, APARTMENT, january(5, 15), january(10, 11), BookingState::Cancelled);
    assert_eq!(derive(&store, APARTMENT), Readiness::Ready);
}

#[test]
fn apartment_without_regular_tasks_is_always_ready_after_checkout() {
    let Fixture { store, .. } = fixture();
    seed_booking(&store, 100, FOREIGN_APARTMENT, january(5, 15), january(10, 11), BookingState::Finished);
    assert_eq!(derive(&store, FOREIGN_APARTMENT), Readiness::Ready);
}

#[test]
fn recompute_persists_and_is_idempotent() {
    let Fixture { store, .. } = fixture();
    seed_booking(&store, 100, APARTMENT, january(5, 15), january(10, 11), BookingState::Finished);
    assert_eq!(readiness(&store, APARTMENT), Readiness::Ready);

    assert_eq!(recompute(&store, APARTMENT), Readiness::Used);
    assert_eq!(readiness(&store, APARTMENT), Readiness::Used);
    assert_eq!(recompute(&store, APARTMENT), Readiness::Used);
    assert_eq!(readiness(&store, APARTMENT), Readiness::Used);
}

#[test]
fn recompute_of_unknown_apartment_is_not_found() {
    let Fixture { store, .. } = fixture();
    let result = store.transaction(|tx| ApartmentStateEngine::recompute(tx, ApartmentId(404)));
    assert!(matches!(result, Err(SchedulingError::NotFound { id: 404, .. })));
}
