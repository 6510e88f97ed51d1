//! WebSocket Connection Handler
//!
//! Upgrades requests from the configured client origin and pumps hub events
//! to the socket until it closes.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{header, HeaderMap},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::hub::Hub;
use super::messages::RealtimeEvent;
use crate::infrastructure::metrics;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    check_origin(&headers, &state.settings.client.url)?;
    let ws = ws.map_err(upgrade_rejection)?;
    let hub = Arc::clone(&state.hub);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, hub)))
}

/// Only the configured client may open a socket from a browser.
///
/// Requests without an `Origin` header are not browser requests and pass.
fn check_origin(headers: &HeaderMap, allowed: &str) -> Result<(), AppError> {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return Ok(());
    };

    let allowed = allowed.trim_end_matches('/');
    match origin.to_str() {
        Ok(origin) if origin.trim_end_matches('/') == allowed => Ok(()),
        _ => Err(AppError::NotAuthorized("Origin not allowed".into())),
    }
}

/// Map a failed upgrade onto the error model.
fn upgrade_rejection(rejection: WebSocketUpgradeRejection) -> AppError {
    AppError::BadRequest(rejection.body_text())
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Arc<Hub>) {
    let session_id = Uuid::new_v4().to_string();
    tracing::debug!(target: "realtime", session_id = %session_id, "New WebSocket connection");

    // Split socket for concurrent read/write
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<RealtimeEvent>();
    hub.register_session(session_id.clone(), tx);
    metrics::websocket_connected();

    // Forward hub events to the socket
    let sender_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(target: "realtime", "Failed to serialize event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                // No inbound events are defined yet.
                tracing::debug!(
                    target: "realtime",
                    session_id = %session_id,
                    len = text.as_str().len(),
                    "Ignoring client message"
                );
            }
            Ok(Message::Close(_)) => {
                tracing::debug!(target: "realtime", session_id = %session_id, "Connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(target: "realtime", session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
            // Pong is handled automatically by axum
            _ => {}
        }
    }

    // Cleanup
    hub.unregister_session(&session_id);
    metrics::websocket_disconnected();
    sender_task.abort();
}
