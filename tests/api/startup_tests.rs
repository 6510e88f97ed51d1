//! Startup Sequence Tests

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::Value;

use chatty_server::infrastructure::database::StoreError;
use chatty_server::startup::{Application, StartupError, StartupPhase, StartupTracker};

use crate::common::{body_json, eventually, get, spawn_app, test_settings, FakeStore, MemoryPubSub};

#[tokio::test]
async fn test_invalid_config_aborts_before_any_connect() {
    let mut settings = test_settings();
    settings.database.url = String::new();
    let store = FakeStore::default();
    let pubsub = MemoryPubSub::new();
    let tracker = StartupTracker::new();

    let result =
        Application::build_with(settings, store.clone(), pubsub.clone(), tracker.clone()).await;

    assert!(matches!(result, Err(StartupError::Config(_))));
    assert_eq!(tracker.phase(), StartupPhase::Aborted);
    assert_eq!(tracker.failed_at(), Some(StartupPhase::ConfigLoad));
    // Give a wrongly spawned supervisor the chance to show up
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.connect_count(), 0);
    assert_eq!(pubsub.connect_count(), 0);
}

#[tokio::test]
async fn test_short_session_secret_aborts() {
    let mut settings = test_settings();
    settings.session.secret_key_one = "too-short".into();
    let tracker = StartupTracker::new();

    let result =
        Application::build_with(settings, FakeStore::default(), MemoryPubSub::new(), tracker.clone())
            .await;

    match result {
        Err(StartupError::Config(e)) => assert!(e.to_string().contains("session.secret_key_one")),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("startup should fail"),
    }
    assert_eq!(tracker.failed_at(), Some(StartupPhase::ConfigLoad));
}

#[tokio::test]
async fn test_subscriber_failure_aborts_realtime_attach() {
    let pubsub = MemoryPubSub::new().failing_subscriber();
    let tracker = StartupTracker::new();

    let result =
        Application::build_with(test_settings(), FakeStore::default(), pubsub.clone(), tracker.clone())
            .await;

    assert!(matches!(result, Err(StartupError::RealtimeAttach(_))));
    assert!(!tracker.is_started());
    assert_eq!(tracker.failed_at(), Some(StartupPhase::RealtimeAttach));
    // Both handles were attempted together
    assert_eq!(pubsub.connect_count(), 2);
}

#[tokio::test]
async fn test_publisher_failure_aborts_realtime_attach() {
    let tracker = StartupTracker::new();

    let result = Application::build_with(
        test_settings(),
        FakeStore::default(),
        MemoryPubSub::new().failing_publisher(),
        tracker.clone(),
    )
    .await;

    assert!(matches!(result, Err(StartupError::RealtimeAttach(_))));
    assert_eq!(tracker.phase(), StartupPhase::Aborted);
}

#[tokio::test]
async fn test_port_in_use_aborts_listen_start() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut settings = test_settings();
    settings.server.port = taken.local_addr().unwrap().port();
    let pubsub = MemoryPubSub::new();
    let tracker = StartupTracker::new();

    let result =
        Application::build_with(settings, FakeStore::default(), pubsub.clone(), tracker.clone())
            .await;

    assert!(matches!(result, Err(StartupError::Bind { .. })));
    assert_eq!(tracker.failed_at(), Some(StartupPhase::ListenStart));
    assert_eq!(pubsub.connect_count(), 0);
}

#[tokio::test]
async fn test_successful_startup_reaches_started() {
    let store = FakeStore::default();
    let tracker = StartupTracker::new();

    let app = Application::build_with(test_settings(), store.clone(), MemoryPubSub::new(), tracker.clone())
        .await
        .unwrap();

    assert!(tracker.is_started());
    assert_eq!(tracker.failed_at(), None);
    assert!(app.state().hub.is_attached());
    assert_ne!(app.local_addr().unwrap().port(), 0);
    crate::common::eventually(|| app.state().store.is_connected()).await;
    assert_eq!(store.connect_count(), 1);
}

#[tokio::test]
async fn test_initial_store_failure_stops_server() {
    let app = Application::build_with(
        test_settings(),
        FakeStore::failing(),
        MemoryPubSub::new(),
        StartupTracker::new(),
    )
    .await
    .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), app.run_until_stopped())
        .await
        .expect("server should stop on its own");

    assert!(matches!(
        result,
        Err(StartupError::Store(StoreError::Connect(_)))
    ));
}

#[tokio::test]
async fn test_lost_subscription_detaches_and_stops_server() {
    let bus = MemoryPubSub::new();
    let app = spawn_app(test_settings(), bus.node()).await.unwrap();
    let state = app.state().clone();
    let router = app.router();

    bus.close_subscriptions();
    eventually(|| !state.hub.is_attached()).await;

    let response = get(&router, "/health/ready").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json: Value = body_json(response).await;
    assert_eq!(json["checks"]["realtime"]["adapter_attached"], false);

    let result = tokio::time::timeout(Duration::from_secs(5), app.run_until_stopped())
        .await
        .expect("server should stop on its own");
    assert!(matches!(result, Err(StartupError::RealtimeLost(_))));
}
