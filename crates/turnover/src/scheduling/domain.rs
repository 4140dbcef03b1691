use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::time_range::TimeRange;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a rentable unit.
    ApartmentId
);
entity_id!(
    /// Identifier of a guest stay.
    BookingId
);
entity_id!(
    /// Identifier of a turnover or ad-hoc task template bound to an apartment.
    TaskId
);
entity_id!(WorkerId);
entity_id!(AssignmentId);

/// Authenticated principal that owns every entity it creates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entity families, used for error reporting and id allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Apartment,
    Booking,
    Task,
    Worker,
    Assignment,
}

impl EntityKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Apartment => "apartment",
            Self::Booking => "booking",
            Self::Task => "task",
            Self::Worker => "worker",
            Self::Assignment => "assignment",
        }
    }
}

/// Derived readiness of an apartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Readiness {
    Ready,
    Occupied,
    Used,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingState {
    Pending,
    InProgress,
    Finished,
    Cancelled,
}

impl BookingState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Finished => "FINISHED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// The guest has not checked out yet.
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    /// The guest has arrived at some point.
    pub const fn has_started(self) -> bool {
        matches!(self, Self::InProgress | Self::Finished)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "PENDING" => Some(Self::Pending),
            "IN_PROGRESS" => Some(Self::InProgress),
            "FINISHED" => Some(Self::Finished),
            "CANCELLED" | "CANCELED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Channel a booking originated from.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingSource {
    #[default]
    None,
    Airbnb,
    BookingCom,
}

impl BookingSource {
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Airbnb => "AIRBNB",
            Self::BookingCom => "BOOKING_COM",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw
            .trim()
            .to_ascii_lowercase()
            .replace(['-', '.', '_'], "")
            .as_str()
        {
            "none" => Some(Self::None),
            "airbnb" => Some(Self::Airbnb),
            "bookingcom" | "booking" => Some(Self::BookingCom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentState {
    #[default]
    Pending,
    Finished,
}

impl AssignmentState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Finished => "FINISHED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "FINISHED" => Some(Self::Finished),
            _ => None,
        }
    }
}

/// Listing reference of an apartment on an external channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRef {
    pub source: BookingSource,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Apartment {
    pub id: ApartmentId,
    pub name: String,
    #[serde(default)]
    pub external_refs: Vec<ExternalRef>,
    pub address: String,
    pub readiness: Readiness,
    pub visible: bool,
    pub owner: OwnerId,
}

impl Apartment {
    pub fn has_external_ref(&self, source: BookingSource, reference: &str) -> bool {
        let reference = reference.trim();
        self.external_refs
            .iter()
            .any(|external| external.source == source && external.reference.trim() == reference)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub apartment_id: ApartmentId,
    pub range: TimeRange,
    pub name: String,
    pub price_cents: i64,
    pub paid: bool,
    pub state: BookingState,
    pub source: BookingSource,
    pub owner: OwnerId,
}

impl Booking {
    pub fn is_cancelled(&self) -> bool {
        self.state == BookingState::Cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub apartment_id: ApartmentId,
    pub name: String,
    pub category: String,
    pub duration_minutes: u32,
    /// Ad-hoc task exempt from checkout-relative timing rules.
    pub extra: bool,
    #[serde(default)]
    pub steps: Vec<String>,
    pub owner: OwnerId,
}

impl Task {
    pub fn is_regular(&self) -> bool {
        !self.extra
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub name: String,
    pub language: String,
    pub salary_cents: i64,
    pub visible: bool,
    pub owner: OwnerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub range: TimeRange,
    pub state: AssignmentState,
    pub owner: OwnerId,
}

impl Assignment {
    pub fn is_finished(&self) -> bool {
        self.state == AssignmentState::Finished
    }
}

/// What an imported booking collides with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "reference", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Conflict {
    BookingConflict(BookingId),
    AssignmentConflict(AssignmentId),
    /// Overlaps an earlier candidate of the same import batch; holds its position.
    ImportBookingConflict(usize),
}

/// Booking read from an external export, before it is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCandidate {
    pub source: BookingSource,
    pub external_id: String,
    pub listing_ref: String,
    pub range: TimeRange,
    pub name: String,
    pub price_cents: i64,
    pub paid: bool,
}

/// Reconciled candidate returned for review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedBooking {
    #[serde(flatten)]
    pub candidate: ImportCandidate,
    pub apartment_id: Option<ApartmentId>,
    pub conflict: Option<Conflict>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub apartment_id: ApartmentId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub name: String,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub source: BookingSource,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingUpdate {
    pub id: BookingId,
    #[serde(default)]
    pub start: Option<NaiveDateTime>,
    #[serde(default)]
    pub end: Option<NaiveDateTime>,
    #[serde(default)]
    pub state: Option<BookingState>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub paid: Option<bool>,
}

impl BookingUpdate {
    pub fn state_only(id: BookingId, state: BookingState) -> Self {
        Self {
            id,
            state: Some(state),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAssignment {
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub start: NaiveDateTime,
    /// Stay the turnover belongs to. Inferred from the apartment's bookings when absent.
    #[serde(default)]
    pub booking_id: Option<BookingId>,
    #[serde(default)]
    pub state: AssignmentState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExtraAssignment {
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub state: AssignmentState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentUpdate {
    pub id: AssignmentId,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub worker_id: Option<WorkerId>,
    #[serde(default)]
    pub start: Option<NaiveDateTime>,
    /// Only honoured for extra tasks; regular tasks derive their end from the duration.
    #[serde(default)]
    pub end: Option<NaiveDateTime>,
    #[serde(default)]
    pub booking_id: Option<BookingId>,
    #[serde(default)]
    pub state: Option<AssignmentState>,
}

impl AssignmentUpdate {
    pub fn state_only(id: AssignmentId, state: AssignmentState) -> Self {
        Self {
            id,
            state: Some(state),
            ..Self::default()
        }
    }

    pub fn changes_schedule(&self) -> bool {
        self.task_id.is_some()
            || self.worker_id.is_some()
            || self.start.is_some()
            || self.end.is_some()
            || self.booking_id.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingFilter {
    #[serde(default)]
    pub apartment_id: Option<ApartmentId>,
    #[serde(default)]
    pub state: Option<BookingState>,
    #[serde(default)]
    pub source: Option<BookingSource>,
    #[serde(default)]
    pub from: Option<NaiveDateTime>,
    #[serde(default)]
    pub to: Option<NaiveDateTime>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.apartment_id.map_or(true, |id| booking.apartment_id == id)
            && self.state.map_or(true, |state| booking.state == state)
            && self.source.map_or(true, |source| booking.source == source)
            && self.from.map_or(true, |from| booking.range.end > from)
            && self.to.map_or(true, |to| booking.range.start < to)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentFilter {
    #[serde(default)]
    pub apartment_id: Option<ApartmentId>,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub worker_id: Option<WorkerId>,
    #[serde(default)]
    pub state: Option<AssignmentState>,
    #[serde(default)]
    pub from: Option<NaiveDateTime>,
    #[serde(default)]
    pub to: Option<NaiveDateTime>,
}

impl AssignmentFilter {
    /// `apartment_id` is resolved by the store through the assignment's task.
    pub fn matches(&self, assignment: &Assignment, apartment_id: Option<ApartmentId>) -> bool {
        self.apartment_id
            .map_or(true, |wanted| apartment_id == Some(wanted))
            && self.task_id.map_or(true, |id| assignment.task_id == id)
            && self.worker_id.map_or(true, |id| assignment.worker_id == id)
            && self.state.map_or(true, |state| assignment.state == state)
            && self.from.map_or(true, |from| assignment.range.end > from)
            && self.to.map_or(true, |to| assignment.range.start < to)
    }
}
