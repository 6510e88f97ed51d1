//! Error Boundary Tests
//!
//! Handler errors, panics and unmatched routes all leave the server in the
//! same two wire shapes.

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use axum_test::TestServer;
use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use chatty_server::infrastructure::metrics;
use chatty_server::presentation::http::ValidatedJson;
use chatty_server::presentation::middleware::install_error_boundary;
use chatty_server::shared::error::{ApiError, AppError, ErrorResponse, NotFoundResponse};

use crate::common::{get as get_request, spawn_app, test_settings, MemoryPubSub};

#[derive(Debug, Deserialize, Validate)]
struct NewRoom {
    #[validate(length(min = 1, max = 32))]
    name: String,
}

async fn bad_payload() -> Result<&'static str, AppError> {
    Err(AppError::BadRequest("bad payload".into()))
}

async fn missing_room() -> Result<&'static str, AppError> {
    Err(AppError::NotFound("room 42 does not exist".into()))
}

async fn database_down() -> Result<&'static str, ApiError> {
    Err(anyhow::anyhow!("connection to 10.0.0.7:5432 refused").into())
}

async fn panics() -> &'static str {
    panic!("secret panic detail")
}

async fn create_room(ValidatedJson(room): ValidatedJson<NewRoom>) -> String {
    room.name
}

fn server() -> TestServer {
    let app = install_error_boundary(
        Router::new()
            .route("/bad", get(bad_payload))
            .route("/missing", get(missing_room))
            .route("/boom", get(database_down))
            .route("/panic", get(panics))
            .route("/rooms", post(create_room)),
    )
    .layer(DefaultBodyLimit::max(64));
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_unmatched_route_returns_not_found_message() {
    let response = server().get("/does-not-exist").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.json::<Value>(),
        json!({"message": "/does-not-exist not found"})
    );
}

#[tokio::test]
async fn test_unmatched_route_through_full_stack() {
    let app = spawn_app(test_settings(), MemoryPubSub::new()).await.unwrap();

    let response = get_request(&app.router(), "/does-not-exist?x=1").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: NotFoundResponse = crate::common::body_json(response).await;
    assert_eq!(body.message, "/does-not-exist?x=1 not found");
}

#[tokio::test]
async fn test_application_error_is_rendered_verbatim() {
    let response = server().get("/bad").await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>(),
        json!({"message": "bad payload", "status": "error", "statusCode": 400})
    );
}

#[tokio::test]
async fn test_not_found_error_uses_404() {
    let response = server().get("/missing").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.json::<ErrorResponse>(),
        ErrorResponse {
            message: "room 42 does not exist".into(),
            status: "error".into(),
            status_code: 404,
        }
    );
}

#[tokio::test]
async fn test_unrecognized_error_hides_details() {
    let response = server().get("/boom").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.json::<Value>(),
        json!({"message": "Internal server error", "status": "error", "statusCode": 500})
    );
    assert!(!response.text().contains("10.0.0.7"));
}

#[tokio::test]
async fn test_panic_becomes_internal_error() {
    let response = server().get("/panic").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = response.text();
    assert!(text.contains("Internal server error"));
    assert!(!text.contains("secret panic detail"));
}

#[tokio::test]
async fn test_unrecognized_errors_are_counted() {
    let server = server();

    server.get("/boom").await;

    let exported = metrics::gather_metrics();
    assert!(
        exported.contains("chatty_server_intercepted_errors_total{kind=\"unrecognized\"}"),
        "{}",
        exported
    );
}

#[tokio::test]
async fn test_oversized_body_is_payload_too_large() {
    let response = server()
        .post("/rooms")
        .json(&json!({"name": "x".repeat(200)}))
        .await;

    assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.json::<ErrorResponse>().status_code, 413);
}

#[tokio::test]
async fn test_invalid_body_is_validation_error() {
    let response = server().post("/rooms").json(&json!({"name": ""})).await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body = response.json::<ErrorResponse>();
    assert!(body.message.starts_with("name: "), "{}", body.message);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let response = server().post("/rooms").text("{\"name\":").await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<ErrorResponse>().status, "error");
}
