//! Realtime Tests
//!
//! Two applications sharing one pub/sub bus stand in for two server processes.

use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use axum::http::{header, StatusCode};
use chatty_server::presentation::websocket::RealtimeEvent;
use chatty_server::shared::error::ErrorResponse;

use crate::common::{body_json, eventually, get, spawn_app, test_settings, MemoryPubSub, CLIENT_ORIGIN};

#[tokio::test]
async fn test_broadcast_reaches_other_node_once() {
    let bus = MemoryPubSub::new();
    let node_a = spawn_app(test_settings(), bus.node()).await.unwrap();
    let node_b = spawn_app(test_settings(), bus.node()).await.unwrap();

    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    node_a.state().hub.register_session("a-1".into(), tx_a);
    node_b.state().hub.register_session("b-1".into(), tx_b);

    let event = RealtimeEvent::new("message", json!({"text": "hi"}));
    let delivered = node_a.state().hub.broadcast(event.clone()).await.unwrap();
    assert_eq!(delivered, 1);

    let remote = tokio::time::timeout(Duration::from_secs(2), rx_b.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(remote, event);
    assert_eq!(rx_a.recv().await.unwrap(), event);

    // Neither node sees the event a second time
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx_a.try_recv().is_err());
    assert!(rx_b.try_recv().is_err());
}

/// Send a WebSocket handshake and return the raw status line.
async fn handshake(stream: &mut TcpStream, origin: &str) -> String {
    let request = format!(
        "GET /socket HTTP/1.1\r\n\
         Host: localhost\r\n\
         Origin: {}\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Version: 13\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
        origin
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    // Read the response head byte by byte so no frame bytes are consumed
    let mut head = Vec::new();
    while !head.ends_with(b"\r\n\r\n") {
        let byte = stream.read_u8().await.unwrap();
        head.push(byte);
    }
    let head = String::from_utf8(head).unwrap();
    head.lines().next().unwrap().to_owned()
}

#[tokio::test]
async fn test_socket_rejects_foreign_origin() {
    let app = spawn_app(test_settings(), MemoryPubSub::new()).await.unwrap();
    let addr = app.local_addr().unwrap();
    tokio::spawn(app.run_until_stopped());

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let status = handshake(&mut stream, "https://evil.example").await;

    assert!(status.starts_with("HTTP/1.1 401"), "{}", status);
}

#[tokio::test]
async fn test_socket_receives_broadcast_events() {
    let app = spawn_app(test_settings(), MemoryPubSub::new()).await.unwrap();
    let addr = app.local_addr().unwrap();
    let hub = app.state().hub.clone();
    tokio::spawn(app.run_until_stopped());

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let status = handshake(&mut stream, CLIENT_ORIGIN).await;
    assert!(status.starts_with("HTTP/1.1 101"), "{}", status);

    eventually(|| hub.session_count() == 1).await;
    let event = RealtimeEvent::new("ping", json!({"n": 1}));
    hub.broadcast(event.clone()).await.unwrap();

    // Unmasked server text frame with a short payload
    let opcode = stream.read_u8().await.unwrap();
    assert_eq!(opcode, 0x81);
    let len = stream.read_u8().await.unwrap() as usize;
    assert!(len < 126);
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.unwrap();

    let received: RealtimeEvent = serde_json::from_slice(&payload).unwrap();
    assert_eq!(received, event);
}

#[tokio::test]
async fn test_plain_get_on_socket_uses_error_body() {
    let app = spawn_app(test_settings(), MemoryPubSub::new()).await.unwrap();

    let response = get(&app.router(), "/socket").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().starts_with("application/json"));
    let body: ErrorResponse = body_json(response).await;
    assert_eq!(body.status, "error");
    assert_eq!(body.status_code, 400);
    assert!(!body.message.is_empty());
}
