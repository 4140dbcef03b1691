use chrono::NaiveDateTime;

use super::domain::{AssignmentId, BookingId, EntityKind};

/// Storage adapter failure.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Coarse classification used by the transport layer to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    Mismatch,
    Invalid,
    Internal,
}

/// Business-rule violations raised by the scheduling engine.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("{} {id} not found", .entity.label())]
    NotFound { entity: EntityKind, id: u64 },
    #[error("{} {id} belongs to another owner", .entity.label())]
    Forbidden { entity: EntityKind, id: u64 },
    #[error("interval must start before it ends ({start} >= {end})")]
    InvalidInterval {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("dates are not available: overlaps {} {id}", .entity.label())]
    NotAvailableDates { entity: EntityKind, id: u64 },
    #[error("task already has an active assignment ({0}) for this booking")]
    DuplicatedTaskForBooking(AssignmentId),
    #[error("assignment does not fit the preparation window before booking {0}")]
    AssignmentNotAtTimeToPrepareNextBooking(BookingId),
    #[error("assignment starts before booking {0} ends")]
    AssignmentBeforeEndBooking(BookingId),
    #[error("booking {0} is cancelled")]
    CancelledBooking(BookingId),
    #[error("cannot complete a turnover task while booking {0} is not finished")]
    CompleteTaskOnNotFinishedBooking(BookingId),
    #[error("booking {0} is already in progress for this apartment")]
    ExistsBookingAlreadyInProgress(BookingId),
    #[error("booking has finished turnover assignments ({0}) and cannot leave FINISHED")]
    AssignmentsFinishedForBooking(AssignmentId),
    #[error("turnover window of booking {0} has already elapsed")]
    ChangeInAssignmentsOfPastBooking(BookingId),
    #[error("previous booking {0} has not finished yet")]
    PreviousBookingNotFinished(BookingId),
    #[error("next booking {0} has already started")]
    NextBookingAlreadyStarted(BookingId),
    #[error("booking has pending turnover assignment {0}")]
    PendingTurnoverForBooking(AssignmentId),
    #[error("booking {booking} and task {task} belong to different apartments")]
    BookingAndTaskNoMatchApartment { booking: BookingId, task: u64 },
    #[error("task {0} is not an extra task")]
    TaskIsNotExtra(u64),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl SchedulingError {
    pub fn not_found(entity: EntityKind, id: u64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::NotAvailableDates { .. }
            | Self::DuplicatedTaskForBooking(_)
            | Self::AssignmentNotAtTimeToPrepareNextBooking(_)
            | Self::AssignmentBeforeEndBooking(_)
            | Self::CancelledBooking(_)
            | Self::CompleteTaskOnNotFinishedBooking(_)
            | Self::ExistsBookingAlreadyInProgress(_)
            | Self::AssignmentsFinishedForBooking(_)
            | Self::ChangeInAssignmentsOfPastBooking(_)
            | Self::PreviousBookingNotFinished(_)
            | Self::NextBookingAlreadyStarted(_)
            | Self::PendingTurnoverForBooking(_) => ErrorKind::Conflict,
            Self::BookingAndTaskNoMatchApartment { .. } | Self::TaskIsNotExtra(_) => {
                ErrorKind::Mismatch
            }
            Self::InvalidInterval { .. } => ErrorKind::Invalid,
            Self::Repository(RepositoryError::NotFound) => ErrorKind::NotFound,
            Self::Repository(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable name of the violation.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::Forbidden { .. } => "Forbidden",
            Self::InvalidInterval { .. } => "InvalidInterval",
            Self::NotAvailableDates { .. } => "NotAvailableDates",
            Self::DuplicatedTaskForBooking(_) => "DuplicatedTaskForBooking",
            Self::AssignmentNotAtTimeToPrepareNextBooking(_) => {
                "AssignmentNotAtTimeToPrepareNextBooking"
            }
            Self::AssignmentBeforeEndBooking(_) => "AssignmentBeforeEndBooking",
            Self::CancelledBooking(_) => "CancelledBooking",
            Self::CompleteTaskOnNotFinishedBooking(_) => "CompleteTaskOnNotFinishedBooking",
            Self::ExistsBookingAlreadyInProgress(_) => "ExistsBookingAlreadyInProgress",
            Self::AssignmentsFinishedForBooking(_) => "AssignmentsFinishedForBooking",
            Self::ChangeInAssignmentsOfPastBooking(_) => "ChangeInAssignmentsOfPastBooking",
            Self::PreviousBookingNotFinished(_) => "PreviousBookingNotFinished",
            Self::NextBookingAlreadyStarted(_) => "NextBookingAlreadyStarted",
            Self::PendingTurnoverForBooking(_) => "PendingTurnoverForBooking",
            Self::BookingAndTaskNoMatchApartment { .. } => "BookingAndTaskNoMatchApartment",
            Self::TaskIsNotExtra(_) => "TaskIsNotExtra",
            Self::Repository(_) => "RepositoryError",
        }
    }
}
