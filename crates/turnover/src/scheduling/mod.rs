//! Booking lifecycle, turnover assignment scheduling and apartment readiness.
//!
//! Every mutating operation runs its conflict checks, its write and the readiness
//! recompute inside one [`SchedulingStore::transaction`]. [`TurnoverService`] is the
//! entry point; [`scheduling_router`] exposes it over HTTP.

pub mod alerts;
pub mod apartment_state;
pub mod assignment;
pub mod booking;
pub mod conflict;
pub mod domain;
pub mod error;
pub mod import;
pub mod memory;
pub mod policy;
pub mod router;
pub mod service;
pub mod store;
pub mod time_range;

#[cfg(test)]
mod tests;

pub use alerts::{AlertLevel, BookingAlert, SchedulerWindow, TurnoverAlertComputer};
pub use apartment_state::ApartmentStateEngine;
pub use assignment::AssignmentScheduler;
pub use booking::BookingLifecycle;
pub use conflict::ConflictDetector;
pub use domain::{
    Apartment, ApartmentId, Assignment, AssignmentFilter, AssignmentId, AssignmentState,
    AssignmentUpdate, Booking, BookingFilter, BookingId, BookingSource, BookingState,
    BookingUpdate, Conflict, EntityKind, ExternalRef, ImportCandidate, ImportedBooking,
    NewAssignment, NewBooking, NewExtraAssignment, OwnerId, Readiness, Task, TaskId, Worker,
    WorkerId,
};
pub use error::{ErrorKind, RepositoryError, SchedulingError};
pub use import::{parse_export, ImportError, ImportReconciler, StayTimes};
pub use memory::InMemoryStore;
pub use policy::{
    AlertThresholds, PrepViolation, PrepWindow, SchedulingPolicy, TurnoverCoverage,
};
pub use router::{scheduling_router, ApiError, Caller, OWNER_HEADER};
pub use service::TurnoverService;
pub use store::{Clock, FixedClock, SchedulingStore, StoreTx, SystemClock};
pub use time_range::TimeRange;
