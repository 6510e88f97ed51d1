//! Database Module
//!
//! PostgreSQL connection pool and its supervised lifecycle.

mod supervisor;

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::warn;

use crate::config::DatabaseSettings;

pub use supervisor::{ReconnectPolicy, StoreConnector, StoreError, StoreHandle, StoreSupervisor};

/// Create a PostgreSQL connection pool
pub async fn create_pool(settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout))
        .connect(settings.connection_url())
        .await
}

/// Round-trip a trivial query through the pool.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

/// Connects to PostgreSQL and detects a lost connection by periodic pings.
pub struct PgConnector {
    settings: DatabaseSettings,
}

impl PgConnector {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl StoreConnector for PgConnector {
    type Connection = PgPool;

    async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        create_pool(&self.settings).await
    }

    async fn disconnected(&self, pool: &PgPool) {
        let mut ticker = tokio::time::interval(self.settings.health_check_interval());
        // Skip first immediate tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = ping(pool).await {
                warn!(target: "store", error = %e, "Database liveness probe failed");
                pool.close().await;
                return;
            }
        }
    }
}
