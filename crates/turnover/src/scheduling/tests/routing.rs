use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::json;
use tower::ServiceExt;

use super::common::*;

use crate::scheduling::domain::BookingState;
use crate::scheduling::policy::SchedulingPolicy;
use crate::scheduling::router::{scheduling_router, OWNER_HEADER};
use crate::scheduling::service::TurnoverService;
use crate::scheduling::store::FixedClock;

fn router_for(service: TestService) -> Router {
    scheduling_router(Arc::new(service))
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(OWNER_HEADER, "host-1")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn empty_request(method: &str, uri: &str, owner: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(OWNER_HEADER, owner)
        .body(Body::empty())
        .expect("request builds")
}

fn booking_payload(start: &str, end: &str) -> serde_json::Value {
    json!({
        "apartment_id": APARTMENT.0,
        "start": start,
        "end": end,
        "name": "Dana Smith",
        "price_cents": 52000,
    })
}

#[tokio::test]
async fn requests_without_owner_are_unauthorized() {
    let Fixture { service, .. } = fixture();
    let response = router_for(service)
        .oneshot(
            Request::get("/booking/1")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "Unauthorized");
}

#[tokio::test]
async fn booking_create_and_conflict_codes() {
    let Fixture { service, .. } = fixture();
    let router = router_for(service);

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/booking",
            booking_payload("2025-06-12T15:00:00", "2025-06-15T11:00:00"),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json_body(response).await;
    assert_eq!(created["state"], "PENDING");
    assert_eq!(created["range"]["start"], "2025-06-12T15:00:00");

    let response = router
        .oneshot(json_request(
            "POST",
            "/booking",
            booking_payload("2025-06-14T15:00:00", "2025-06-16T11:00:00"),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "NotAvailableDates");
    assert!(payload["message"].as_str().is_some());
}

#[tokio::test]
async fn missing_and_foreign_bookings_map_to_404_and_403() {
    let Fixture { store, service } = fixture();
    let id = seed_booking(&store, 100, APARTMENT, at(6, 12, 15), at(6, 15, 11), BookingState::Pending);
    let router = router_for(service);

    let response = router
        .clone()
        .oneshot(empty_request("GET", "/booking/999", "host-1"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json_body(response).await["error"], "NotFound");

    let response = router
        .oneshot(empty_request("GET", &format!("/booking/{id}"), "host-2"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn state_transitions_are_taken_from_the_path() {
    let Fixture { store, service } = fixture();
    let id = seed_booking(&store, 100, APARTMENT, at(6, 12, 15), at(6, 15, 11), BookingState::Pending);
    let router = router_for(service);

    let response = router
        .clone()
        .oneshot(empty_request("PATCH", &format!("/booking/{id}/state/in_progress"), "host-1"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await["state"], "IN_PROGRESS");

    let response = router
        .oneshot(empty_request("PATCH", &format!("/booking/{id}/state/asleep"), "host-1"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json_body(response).await["error"], "BadRequest");
}

#[tokio::test]
async fn assignment_routes_create_and_delete() {
    let Fixture { store, service } = fixture();
    seed_booking(&store, 100, APARTMENT, at(6, 12, 15), at(6, 15, 11), BookingState::Pending);
    let router = router_for(service);

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/assignment",
            json!({
                "task_id": CLEANING.0,
                "worker_id": ALICE.0,
                "start": "2025-06-15T12:00:00",
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json_body(response).await;
    assert_eq!(created["range"]["end"], "2025-06-15T14:00:00");
    let id = created["id"].as_u64().expect("numeric id");

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/assignment/extra",
            json!({
                "task_id": CLEANING.0,
                "worker_id": BOB.0,
                "start": "2025-06-16T12:00:00",
                "end": "2025-06-16T13:00:00",
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json_body(response).await["error"], "TaskIsNotExtra");

    let response = router
        .oneshot(empty_request("DELETE", &format!("/assignment/{id}"), "host-1"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(store.assignments().is_empty());
}

#[tokio::test]
async fn scheduler_board_takes_day_month_year() {
    let Fixture { store, service } = fixture();
    seed_booking(&store, 100, APARTMENT, at(6, 11, 15), at(6, 12, 11), BookingState::Pending);
    let router = router_for(service);

    let response = router
        .clone()
        .oneshot(empty_request("POST", "/scheduler/10-06-2025", "host-1"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let board = read_json_body(response).await;
    assert_eq!(board["red_alerts"][0]["code"], "DAYS_LEFT_2_UNASSIGNED");
    assert_eq!(board["red_alerts"][0]["level"], "RED");

    let response = router
        .oneshot(empty_request("POST", "/scheduler/2025-06-10", "host-1"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

fn multipart_request(uri: &str, content_type: &str, payload: &str) -> Request<Body> {
    let body = format!(
        "--XBOUNDARY\r\n\
Content-Disposition: form-data; name=\"file\"; filename=\"export.csv\"\r\n\
Content-Type: {content_type}\r\n\r\n\
{payload}\r\n\
--XBOUNDARY--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
        .header(OWNER_HEADER, "host-1")
        .body(Body::from(body))
        .expect("request builds")
}

#[tokio::test]
async fn import_accepts_multipart_exports() {
    let Fixture { store, service } = fixture();
    seed_booking(&store, 100, APARTMENT, at(6, 20, 15), at(6, 23, 11), BookingState::Pending);
    let router = router_for(service);
    let export = "Confirmation code,Status,Guest name,Start date,End date,Listing,Earnings\n\
HM1,Confirmed,Ana Lopez,06/21/2025,06/24/2025,4411,$480.00";

    let response = router
        .clone()
        .oneshot(multipart_request("/booking/import/airbnb", "text/csv", export))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload[0]["external_id"], "HM1");
    assert_eq!(payload[0]["apartment_id"], APARTMENT.0);
    assert_eq!(payload[0]["conflict"]["type"], "BOOKING_CONFLICT");

    let response = router
        .clone()
        .oneshot(multipart_request("/booking/import/vrbo", "text/csv", export))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json_body(response).await["error"], "UnsupportedImportSource");

    let response = router
        .oneshot(multipart_request("/booking/import/airbnb", "image/png", export))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn storage_failures_surface_as_internal_errors() {
    let service = TurnoverService::new(
        Arc::new(UnavailableStore),
        Arc::new(FixedClock(now())),
        SchedulingPolicy::default(),
    );
    let router = scheduling_router(Arc::new(service));

    let response = router
        .oneshot(empty_request("GET", "/booking/1", "host-1"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(read_json_body(response).await["error"], "RepositoryError");
}
