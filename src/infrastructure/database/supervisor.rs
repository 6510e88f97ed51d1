//! Store Supervisor
//!
//! Owns the process-wide database connection. The first connect is fatal on
//! failure; after that every lost connection is re-established through the
//! same connect routine under a [`ReconnectPolicy`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ReconnectSettings;
use crate::infrastructure::metrics;

/// Errors that stop the supervisor.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("gave up reconnecting to database after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    #[error("store supervisor stopped unexpectedly: {0}")]
    Supervisor(String),
}

/// Opens connections to the persistent store and watches them.
#[async_trait]
pub trait StoreConnector: Send + Sync + 'static {
    type Connection: Clone + Send + Sync + 'static;

    /// Establish a new connection.
    async fn connect(&self) -> Result<Self::Connection, sqlx::Error>;

    /// Resolves once `connection` is lost.
    async fn disconnected(&self, connection: &Self::Connection);
}

/// Backoff and retry limit for reconnect attempts.
///
/// The first attempt after a disconnect is immediate. Attempt `n` (n >= 1
/// counting failed attempts so far) waits `initial_backoff * 2^(n-1)`,
/// capped at `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_retries: Option<u32>,
}

impl ReconnectPolicy {
    /// Delay before the attempt that follows `failed` failed attempts.
    pub fn backoff(&self, failed: u32) -> Duration {
        if failed == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(failed - 1);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_retries.is_some_and(|max| attempts >= max)
    }
}

impl From<&ReconnectSettings> for ReconnectPolicy {
    fn from(settings: &ReconnectSettings) -> Self {
        Self {
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
            max_retries: settings.max_retries,
        }
    }
}

/// Shared view of the current connection.
///
/// `None` while the initial connect is in flight or a reconnect is running.
pub struct StoreHandle<C> {
    current: Arc<RwLock<Option<C>>>,
}

impl<C> Clone for StoreHandle<C> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
        }
    }
}

impl<C: Clone> StoreHandle<C> {
    fn new() -> Self {
        Self {
            current: Arc::new(RwLock::new(None)),
        }
    }

    pub fn current(&self) -> Option<C> {
        self.current.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.current.read().is_some()
    }

    fn replace(&self, connection: Option<C>) {
        *self.current.write() = connection;
    }
}

/// Supervises one store connection for the lifetime of the process.
pub struct StoreSupervisor<K: StoreConnector> {
    connector: K,
    policy: ReconnectPolicy,
    handle: StoreHandle<K::Connection>,
}

impl<K: StoreConnector> StoreSupervisor<K> {
    pub fn new(connector: K, policy: ReconnectPolicy) -> Self {
        Self {
            connector,
            policy,
            handle: StoreHandle::new(),
        }
    }

    pub fn handle(&self) -> StoreHandle<K::Connection> {
        self.handle.clone()
    }

    /// Run the supervisor on its own task without waiting for the first connect.
    pub fn spawn(self) -> (StoreHandle<K::Connection>, JoinHandle<Result<(), StoreError>>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run());
        (handle, task)
    }

    /// Connect, then keep the connection alive.
    ///
    /// Only returns on a fatal error: the initial connect failed or the retry
    /// limit was reached.
    pub async fn run(self) -> Result<(), StoreError> {
        let mut connection = match self.connector.connect().await {
            Ok(connection) => connection,
            Err(e) => {
                error!(target: "store", error = %e, "Connection to database failed");
                return Err(StoreError::Connect(e));
            }
        };
        info!(target: "store", "Successfully connected to database");
        self.handle.replace(Some(connection.clone()));

        loop {
            self.connector.disconnected(&connection).await;
            warn!(target: "store", "Database disconnected, reconnecting");
            self.handle.replace(None);

            connection = self.reconnect().await?;
            self.handle.replace(Some(connection.clone()));
        }
    }

    async fn reconnect(&self) -> Result<K::Connection, StoreError> {
        let mut attempts: u32 = 0;
        loop {
            let delay = self.policy.backoff(attempts);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            attempts += 1;
            metrics::record_store_reconnect_attempt();

            match self.connector.connect().await {
                Ok(connection) => {
                    info!(target: "store", attempts, "Reconnected to database");
                    return Ok(connection);
                }
                Err(e) => {
                    error!(target: "store", attempts, error = %e, "Reconnect attempt failed");
                    if self.policy.exhausted(attempts) {
                        return Err(StoreError::RetriesExhausted {
                            attempts,
                            source: e,
                        });
                    }
                }
            }
        }
    }
}
