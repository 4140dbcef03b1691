use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Multipart, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde_json::json;

use super::domain::{
    AssignmentFilter, AssignmentId, AssignmentState, AssignmentUpdate, BookingFilter, BookingId,
    BookingSource, BookingState, BookingUpdate, NewAssignment, NewBooking, NewExtraAssignment,
    OwnerId,
};
use super::error::{ErrorKind, SchedulingError};
use super::import::ImportError;
use super::service::TurnoverService;
use super::store::{Clock, SchedulingStore};

/// Header carrying the authenticated principal, set by the security boundary.
pub const OWNER_HEADER: &str = "x-owner-id";

const SCHEDULER_DATE_FORMAT: &str = "%d-%m-%Y";

/// Router exposing bookings, assignments, the scheduler board and imports.
pub fn scheduling_router<S, C>(service: Arc<TurnoverService<S, C>>) -> Router
where
    S: SchedulingStore + 'static,
    C: Clock + 'static,
{
    Router::new()
        .route(
            "/assignment",
            post(create_assignment::<S, C>).patch(update_assignment::<S, C>),
        )
        .route("/assignment/extra", post(create_extra_assignment::<S, C>))
        .route(
            "/assignment/:id",
            get(get_assignment::<S, C>).delete(delete_assignment::<S, C>),
        )
        .route(
            "/assignment/:id/state/:state",
            patch(set_assignment_state::<S, C>),
        )
        .route("/assignments/search", post(search_assignments::<S, C>))
        .route(
            "/booking",
            post(create_booking::<S, C>).patch(update_booking::<S, C>),
        )
        .route(
            "/booking/:id",
            get(get_booking::<S, C>).delete(delete_booking::<S, C>),
        )
        .route("/booking/:id/state/:state", patch(set_booking_state::<S, C>))
        .route("/bookings/search", post(search_bookings::<S, C>))
        .route("/booking/import/:source", post(import_bookings::<S, C>))
        .route("/scheduler/:start_date", post(scheduler_window::<S, C>))
        .with_state(service)
}

/// Caller identity taken from [`OWNER_HEADER`].
#[derive(Debug, Clone)]
pub struct Caller(pub OwnerId);

#[axum::async_trait]
impl<St> FromRequestParts<St> for Caller
where
    St: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Caller(OwnerId(value.to_string())))
            .ok_or(ApiError::Unauthorized)
    }
}

/// Transport view of every failure a scheduling endpoint can return.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("{0}")]
    BadRequest(String),
    #[error("missing x-owner-id header")]
    Unauthorized,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Scheduling(err) | ApiError::Import(ImportError::Scheduling(err)) => {
                (status_for(err.kind()), err.code())
            }
            ApiError::Import(ImportError::UnsupportedSource(_)) => {
                (StatusCode::BAD_REQUEST, "UnsupportedImportSource")
            }
            ApiError::Import(_) => (StatusCode::BAD_REQUEST, "InvalidImportFile"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let payload = json!({
            "error": code,
            "message": self.to_string(),
        });
        (status, Json(payload)).into_response()
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Mismatch | ErrorKind::Invalid => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

type ServiceState<S, C> = State<Arc<TurnoverService<S, C>>>;

async fn create_assignment<S, C>(
    State(service): ServiceState<S, C>,
    Caller(caller): Caller,
    Json(request): Json<NewAssignment>,
) -> Result<Response, ApiError>
where
    S: SchedulingStore + 'static,
    C: Clock + 'static,
{
    let assignment = service.create_assignment(&caller, request)?;
    Ok((StatusCode::CREATED, Json(assignment)).into_response())
}

async fn create_extra_assignment<S, C>(
    State(service): ServiceState<S, C>,
    Caller(caller): Caller,
    Json(request): Json<NewExtraAssignment>,
) -> Result<Response, ApiError>
where
    S: SchedulingStore + 'static,
    C: Clock + 'static,
{
    let assignment = service.create_extra_assignment(&caller, request)?;
    Ok((StatusCode::CREATED, Json(assignment)).into_response())
}

async fn update_assignment<S, C>(
    State(service): ServiceState<S, C>,
    Caller(caller): Caller,
    Json(update): Json<AssignmentUpdate>,
) -> Result<Response, ApiError>
where
    S: SchedulingStore + 'static,
    C: Clock + 'static,
{
    let assignment = service.update_assignment(&caller, update)?;
    Ok(Json(assignment).into_response())
}

async fn set_assignment_state<S, C>(
    State(service): ServiceState<S, C>,
    Caller(caller): Caller,
    Path((id, state)): Path<(u64, String)>,
) -> Result<Response, ApiError>
where
    S: SchedulingStore + 'static,
    C: Clock + 'static,
{
    let state = AssignmentState::parse(&state)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown assignment state `{state}`")))?;
    let assignment = service.set_assignment_state(&caller, AssignmentId(id), state)?;
    Ok(Json(assignment).into_response())
}

async fn get_assignment<S, C>(
    State(service): ServiceState<S, C>,
    Caller(caller): Caller,
    Path(id): Path<u64>,
) -> Result<Response, ApiError>
where
    S: SchedulingStore + 'static,
    C: Clock + 'static,
{
    let assignment = service.get_assignment(&caller, AssignmentId(id))?;
    Ok(Json(assignment).into_response())
}

async fn delete_assignment<S, C>(
    State(service): ServiceState<S, C>,
    Caller(caller): Caller,
    Path(id): Path<u64>,
) -> Result<Response, ApiError>
where
    S: SchedulingStore + 'static,
    C: Clock + 'static,
{
    service.delete_assignment(&caller, AssignmentId(id))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn search_assignments<S, C>(
    State(service): ServiceState<S, C>,
    Caller(caller): Caller,
    Json(filter): Json<AssignmentFilter>,
) -> Result<Response, ApiError>
where
    S: SchedulingStore + 'static,
    C: Clock + 'static,
{
    let assignments = service.search_assignments(&caller, &filter)?;
    Ok(Json(assignments).into_response())
}

async fn create_booking<S, C>(
    State(service): ServiceState<S, C>,
    Caller(caller): Caller,
    Json(request): Json<NewBooking>,
) -> Result<Response, ApiError>
where
    S: SchedulingStore + 'static,
    C: Clock + 'static,
{
    let booking = service.create_booking(&caller, request)?;
    Ok((StatusCode::CREATED, Json(booking)).into_response())
}

async fn update_booking<S, C>(
    State(service): ServiceState<S, C>,
    Caller(caller): Caller,
    Json(update): Json<BookingUpdate>,
) -> Result<Response, ApiError>
where
    S: SchedulingStore + 'static,
    C: Clock + 'static,
{
    let booking = service.update_booking(&caller, update)?;
    Ok(Json(booking).into_response())
}

async fn set_booking_state<S, C>(
    State(service): ServiceState<S, C>,
    Caller(caller): Caller,
    Path((id, state)): Path<(u64, String)>,
) -> Result<Response, ApiError>
where
    S: SchedulingStore + 'static,
    C: Clock + 'static,
{
    let state = BookingState::parse(&state)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown booking state `{state}`")))?;
    let booking = service.set_booking_state(&caller, BookingId(id), state)?;
    Ok(Json(booking).into_response())
}

async fn get_booking<S, C>(
    State(service): ServiceState<S, C>,
    Caller(caller): Caller,
    Path(id): Path<u64>,
) -> Result<Response, ApiError>
where
    S: SchedulingStore + 'static,
    C: Clock + 'static,
{
    let booking = service.get_booking(&caller, BookingId(id))?;
    Ok(Json(booking).into_response())
}

async fn delete_booking<S, C>(
    State(service): ServiceState<S, C>,
    Caller(caller): Caller,
    Path(id): Path<u64>,
) -> Result<Response, ApiError>
where
    S: SchedulingStore + 'static,
    C: Clock + 'static,
{
    service.delete_booking(&caller, BookingId(id))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn search_bookings<S, C>(
    State(service): ServiceState<S, C>,
    Caller(caller): Caller,
    Json(filter): Json<BookingFilter>,
) -> Result<Response, ApiError>
where
    S: SchedulingStore + 'static,
    C: Clock + 'static,
{
    let bookings = service.search_bookings(&caller, &filter)?;
    Ok(Json(bookings).into_response())
}

async fn scheduler_window<S, C>(
    State(service): ServiceState<S, C>,
    Caller(caller): Caller,
    Path(start_date): Path<String>,
) -> Result<Response, ApiError>
where
    S: SchedulingStore + 'static,
    C: Clock + 'static,
{
    let start = NaiveDate::parse_from_str(start_date.trim(), SCHEDULER_DATE_FORMAT).map_err(|_| {
        ApiError::BadRequest(format!("scheduler date `{start_date}` is not dd-MM-yyyy"))
    })?;
    let window = service.scheduler_window(&caller, start)?;
    Ok(Json(window).into_response())
}

/// Multipart upload with the export in a `file` field.
async fn import_bookings<S, C>(
    State(service): ServiceState<S, C>,
    Caller(caller): Caller,
    Path(source): Path<String>,
    mut multipart: Multipart,
) -> Result<Response, ApiError>
where
    S: SchedulingStore + 'static,
    C: Clock + 'static,
{
    let source = BookingSource::parse(&source)
        .filter(|source| *source != BookingSource::None)
        .ok_or_else(|| ApiError::Import(ImportError::UnsupportedSource(source.clone())))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if let Some(content_type) = field.content_type() {
            if !accepts_export(content_type) {
                return Err(ApiError::BadRequest(format!(
                    "unsupported export content type `{content_type}`"
                )));
            }
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;
        let reconciled = service.import_bookings(&caller, source, &bytes[..])?;
        return Ok(Json(reconciled).into_response());
    }

    Err(ApiError::BadRequest("multipart field `file` is required".to_string()))
}

fn accepts_export(content_type: &str) -> bool {
    match content_type.parse::<mime::Mime>() {
        Ok(parsed) => {
            parsed.type_() == mime::TEXT
                || parsed.essence_str() == mime::APPLICATION_OCTET_STREAM.essence_str()
                || parsed.subtype() == "vnd.ms-excel"
                || parsed.subtype() == "csv"
        }
        Err(_) => false,
    }
}
