//! Application Startup
//!
//! Runs the fixed startup sequence and owns the running server:
//!
//! ```text
//! ConfigLoad -> StoreConnect -> ServerConstruct -> ListenStart -> RealtimeAttach -> Started
//! ```
//!
//! Any failing step aborts the sequence; nothing after it runs. The store
//! connect is started in the background and is not awaited, but its failure
//! stops a running server.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, middleware, Router};
use config::ConfigError;
use parking_lot::RwLock;
use serde::Serialize;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::compression::CompressionLayer;
use tracing::{error, info};

use crate::config::Settings;
use crate::infrastructure::database::{
    PgConnector, ReconnectPolicy, StoreConnector, StoreError, StoreHandle, StoreSupervisor,
};
use crate::infrastructure::pubsub::{PubSubConnector, RedisPubSub};
use crate::presentation::http::{handlers::health, routes};
use crate::presentation::middleware::{
    create_cors_layer, create_security_headers_layer, create_trace_layer, install_error_boundary,
    session_middleware, track_metrics, SessionKeys,
};
use crate::presentation::websocket::{self, Hub, HubError};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: StoreHandle<PgPool>,
    pub hub: Arc<Hub>,
    pub settings: Arc<Settings>,
    pub startup: StartupTracker,
}

/// Steps of the startup sequence, plus its two terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupPhase {
    ConfigLoad,
    StoreConnect,
    ServerConstruct,
    ListenStart,
    RealtimeAttach,
    Started,
    Aborted,
}

#[derive(Debug)]
struct TrackerState {
    phase: StartupPhase,
    failed_at: Option<StartupPhase>,
}

/// Shared record of how far startup got.
#[derive(Debug, Clone)]
pub struct StartupTracker {
    state: Arc<RwLock<TrackerState>>,
}

impl StartupTracker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(TrackerState {
                phase: StartupPhase::ConfigLoad,
                failed_at: None,
            })),
        }
    }

    fn enter(&self, phase: StartupPhase) {
        tracing::debug!(target: "server", ?phase, "Entering startup phase");
        self.state.write().phase = phase;
    }

    fn complete(&self) {
        self.state.write().phase = StartupPhase::Started;
    }

    /// Mark startup as failed in the current phase. Terminal.
    fn abort(&self) {
        let mut state = self.state.write();
        if state.failed_at.is_none() && state.phase != StartupPhase::Aborted {
            state.failed_at = Some(state.phase);
        }
        state.phase = StartupPhase::Aborted;
    }

    pub fn phase(&self) -> StartupPhase {
        self.state.read().phase
    }

    /// Phase that was running when startup aborted.
    pub fn failed_at(&self) -> Option<StartupPhase> {
        self.state.read().failed_at
    }

    pub fn is_started(&self) -> bool {
        self.phase() == StartupPhase::Started
    }
}

impl Default for StartupTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that abort startup or stop a running server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to attach realtime adapter: {0}")]
    RealtimeAttach(#[from] HubError),

    #[error("realtime adapter lost: {0}")]
    RealtimeLost(#[source] HubError),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    state: AppState,
    store_task: JoinHandle<Result<(), StoreError>>,
    realtime_task: JoinHandle<HubError>,
}

impl Application {
    /// Build the application against PostgreSQL and Redis.
    pub async fn build(settings: Settings) -> Result<Self, StartupError> {
        let store = PgConnector::new(settings.database.clone());
        let pubsub = RedisPubSub::new(&settings.redis);
        Self::build_with(settings, store, pubsub, StartupTracker::new()).await
    }

    /// Run the startup sequence with the given store and pub/sub connectors.
    pub async fn build_with<K, P>(
        settings: Settings,
        store: K,
        pubsub: P,
        tracker: StartupTracker,
    ) -> Result<Self, StartupError>
    where
        K: StoreConnector<Connection = PgPool>,
        P: PubSubConnector,
    {
        tracker.enter(StartupPhase::ConfigLoad);
        if let Err(e) = settings.validate() {
            error!(target: "server", error = %e, "Configuration is invalid");
            tracker.abort();
            return Err(e.into());
        }
        let settings = Arc::new(settings);

        tracker.enter(StartupPhase::StoreConnect);
        let supervisor = StoreSupervisor::new(
            store,
            ReconnectPolicy::from(&settings.database.reconnect),
        );
        let (store_handle, store_task) = supervisor.spawn();

        let state = AppState {
            store: store_handle,
            hub: Arc::new(Hub::new()),
            settings,
            startup: tracker.clone(),
        };

        match Self::serve_realtime(state.clone(), &pubsub).await {
            Ok((listener, router, realtime_task)) => {
                tracker.complete();
                info!(target: "server", "Startup complete");
                Ok(Self {
                    listener,
                    router,
                    state,
                    store_task,
                    realtime_task,
                })
            }
            Err(e) => {
                error!(
                    target: "server",
                    phase = ?tracker.phase(),
                    error = %e,
                    "Startup aborted"
                );
                tracker.abort();
                store_task.abort();
                Err(e)
            }
        }
    }

    /// ServerConstruct, ListenStart and RealtimeAttach.
    async fn serve_realtime(
        state: AppState,
        pubsub: &dyn PubSubConnector,
    ) -> Result<(TcpListener, Router, JoinHandle<HubError>), StartupError> {
        let tracker = state.startup.clone();
        let settings = Arc::clone(&state.settings);

        tracker.enter(StartupPhase::ServerConstruct);
        health::init_server_start();
        let session_keys = SessionKeys::from_settings(&settings)?;
        let router = build_router(state.clone(), session_keys);

        tracker.enter(StartupPhase::ListenStart);
        let addr = settings.server_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| StartupError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| StartupError::Bind { addr, source })?;
        info!(
            target: "server",
            pid = std::process::id(),
            address = %local_addr,
            environment = %settings.environment,
            "Server listening"
        );

        tracker.enter(StartupPhase::RealtimeAttach);
        let realtime_task = websocket::attach(pubsub, Arc::clone(&state.hub)).await?;

        Ok((listener, router, realtime_task))
    }

    /// Serve until a shutdown signal, until the store supervisor gives up, or
    /// until the pub/sub subscription ends.
    pub async fn run_until_stopped(self) -> Result<(), StartupError> {
        let Self {
            listener,
            router,
            mut store_task,
            mut realtime_task,
            ..
        } = self;

        let server = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .into_future();

        let result = tokio::select! {
            served = server => served.map_err(StartupError::Serve),
            stopped = &mut store_task => {
                let err = match stopped {
                    Ok(Ok(())) => StoreError::Supervisor("supervisor exited".into()),
                    Ok(Err(e)) => e,
                    Err(e) => StoreError::Supervisor(e.to_string()),
                };
                error!(target: "store", error = %err, "Store supervisor stopped, shutting down");
                Err(err.into())
            }
            lost = &mut realtime_task => {
                let err = lost.unwrap_or(HubError::SubscriptionClosed);
                error!(target: "realtime", error = %err, "Realtime relay stopped, shutting down");
                Err(StartupError::RealtimeLost(err))
            }
        };

        store_task.abort();
        realtime_task.abort();
        result
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn tracker(&self) -> &StartupTracker {
        &self.state.startup
    }
}

/// Assemble routes, the error boundary and every middleware layer.
///
/// Layers run outermost first: security headers, CORS, session, tracing,
/// metrics, compression, body limit, then the error boundary around the
/// routes and the 404 fallback.
pub fn build_router(state: AppState, session_keys: SessionKeys) -> Router {
    let settings = Arc::clone(&state.settings);

    install_error_boundary(routes::create_router(state))
        .layer(DefaultBodyLimit::max(settings.http.body_limit_bytes))
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(track_metrics))
        .layer(create_trace_layer())
        .layer(middleware::from_fn_with_state(
            session_keys,
            session_middleware,
        ))
        .layer(create_cors_layer(&settings.client))
        .layer(create_security_headers_layer(&settings))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(target: "server", error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(target: "server", error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!(target: "server", "Shutdown signal received");
}
