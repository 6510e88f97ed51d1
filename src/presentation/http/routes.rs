//! Route Configuration
//!
//! Configures all HTTP routes for the server.

use axum::{response::IntoResponse, routing::get, Router};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Path of the WebSocket upgrade endpoint
pub const SOCKET_PATH: &str = "/socket";

/// Create the router with every real route.
///
/// The 404 fallback and error boundary are added by the caller once all
/// routes are in place.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Realtime endpoint
        .route(SOCKET_PATH, get(ws_handler))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}
