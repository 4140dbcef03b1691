use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use turnover::scheduling::{
    Apartment, ApartmentId, Booking, BookingId, BookingSource, BookingState, ExternalRef,
    InMemoryStore, OwnerId, Readiness, Task, TaskId, TimeRange, Worker, WorkerId,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) const DEMO_OWNER: &str = "demo-host";
pub(crate) const DEMO_LISTING: &str = "4411";

pub(crate) fn demo_owner() -> OwnerId {
    OwnerId(DEMO_OWNER.to_string())
}

/// Seeds two apartments with their cleaning tasks and a pair of workers.
pub(crate) fn seed_demo_catalog(store: &InMemoryStore) {
    let owner = demo_owner();
    for (id, name, listing) in [
        (ApartmentId(1), "Harbour Loft", Some(DEMO_LISTING)),
        (ApartmentId(2), "Garden Studio", None),
    ] {
        store.seed_apartment(Apartment {
            id,
            name: name.to_string(),
            external_refs: listing
                .map(|reference| {
                    vec![ExternalRef {
                        source: BookingSource::Airbnb,
                        reference: reference.to_string(),
                    }]
                })
                .unwrap_or_default(),
            address: format!("{name}, Quay Street"),
            readiness: Readiness::Ready,
            visible: true,
            owner: owner.clone(),
        });
    }

    for (id, apartment, name, minutes, extra) in [
        (TaskId(10), ApartmentId(1), "Turnover clean", 120, false),
        (TaskId(11), ApartmentId(2), "Turnover clean", 90, false),
        (TaskId(12), ApartmentId(1), "Boiler service", 60, true),
    ] {
        store.seed_task(Task {
            id,
            apartment_id: apartment,
            name: name.to_string(),
            category: if extra { "maintenance" } else { "cleaning" }.to_string(),
            duration_minutes: minutes,
            extra,
            steps: Vec::new(),
            owner: owner.clone(),
        });
    }

    for (id, name) in [(WorkerId(20), "Marta"), (WorkerId(21), "Jonas")] {
        store.seed_worker(Worker {
            id,
            name: name.to_string(),
            language: "en".to_string(),
            salary_cents: 1_600,
            visible: true,
            owner: owner.clone(),
        });
    }
}

/// Adds upcoming stays relative to `today` so the scheduler board has something to flag.
pub(crate) fn seed_demo_bookings(store: &InMemoryStore, today: NaiveDate) {
    let check_in = NaiveTime::from_hms_opt(15, 0, 0).unwrap_or(NaiveTime::MIN);
    let check_out = NaiveTime::from_hms_opt(11, 0, 0).unwrap_or(NaiveTime::MIN);
    let stay = |from: i64, nights: i64| -> Option<TimeRange> {
        let start = (today + Duration::days(from)).and_time(check_in);
        let end = (today + Duration::days(from + nights)).and_time(check_out);
        TimeRange::new(start, end).ok()
    };

    let stays = [
        (100, ApartmentId(1), -3, 3, BookingState::Finished, "R. Novak"),
        (101, ApartmentId(1), 1, 2, BookingState::Pending, "L. Moreau"),
        (102, ApartmentId(2), 4, 3, BookingState::Pending, "K. Tanaka"),
        (103, ApartmentId(1), 9, 4, BookingState::Pending, "S. Okafor"),
    ];
    for (id, apartment_id, from, nights, state, name) in stays {
        let Some(range) = stay(from, nights) else {
            continue;
        };
        store.seed_booking(Booking {
            id: BookingId(id),
            apartment_id,
            range,
            name: name.to_string(),
            price_cents: 38_000 * nights,
            paid: state == BookingState::Finished,
            state,
            source: BookingSource::None,
            owner: demo_owner(),
        });
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%d-%m-%Y")
        .map_err(|err| format!("failed to parse '{raw}' as dd-mm-yyyy ({err})"))
}

/// Morning of `day`, used as the demo's frozen clock.
pub(crate) fn morning_of(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN))
}
