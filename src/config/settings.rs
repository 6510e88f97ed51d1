//! Application settings and configuration structures.

use std::time::Duration;

use axum::http::HeaderValue;
use config::{Config, ConfigError, Environment, File};
use redis::IntoConnectionInfo;
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration for the realtime pub/sub adapter
    pub redis: RedisSettings,

    /// The browser client allowed to talk to this server
    pub client: ClientSettings,

    /// Session cookie signing
    pub session: SessionSettings,

    /// Request handling limits
    pub http: HttpSettings,

    /// Log output
    #[serde(default)]
    pub log: LogSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    #[serde(default)]
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,

    /// Seconds between liveness probes used to detect a lost connection
    pub health_check_interval: u64,

    /// Reconnect policy applied after a lost connection
    pub reconnect: ReconnectSettings,
}

/// Reconnect backoff configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectSettings {
    /// Delay before the second reconnect attempt, in milliseconds
    pub initial_backoff_ms: u64,

    /// Upper bound for the delay between attempts, in milliseconds
    pub max_backoff_ms: u64,

    /// Give up after this many failed attempts (unset = keep trying)
    #[serde(default)]
    pub max_retries: Option<u32>,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    #[serde(default)]
    pub url: String,
}

/// Client origin configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSettings {
    /// Origin of the browser client (e.g. "http://localhost:3000")
    #[serde(default)]
    pub url: String,
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// Key used to sign new session cookies
    #[serde(default)]
    pub secret_key_one: String,

    /// Previous key, still accepted when verifying cookies
    #[serde(default)]
    pub secret_key_two: String,

    /// Cookie lifetime in seconds
    pub max_age_secs: u64,
}

/// HTTP request limits.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    /// Maximum accepted request body size in bytes
    pub body_limit_bytes: usize,
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// Default filter directive when RUST_LOG is not set
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
        }
    }
}

/// Minimum required length for a session signing secret (256 bits = 32 bytes)
pub const MIN_SESSION_SECRET_LENGTH: usize = 32;

/// Environment name that relaxes production-only settings such as secure cookies.
pub const DEVELOPMENT_ENVIRONMENT: &str = "development";

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// Loading does not check the values; [`Settings::validate`] does, as
    /// the first step of startup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment =
            std::env::var("RUN_ENV").unwrap_or_else(|_| DEVELOPMENT_ENVIRONMENT.into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("database.health_check_interval", 5)?
            .set_default("database.reconnect.initial_backoff_ms", 500)?
            .set_default("database.reconnect.max_backoff_ms", 30_000)?
            .set_default("session.max_age_secs", 7 * 24 * 3600)?
            .set_default("http.body_limit_bytes", 50 * 1024 * 1024)?
            .set_default("log.level", "info")?
            .set_default("log.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=5000 -> server.port = 5000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_HOST").ok())?
            .set_override_option("client.url", std::env::var("CLIENT_URL").ok())?
            .set_override_option(
                "session.secret_key_one",
                std::env::var("SECRET_KEY_ONE").ok(),
            )?
            .set_override_option(
                "session.secret_key_two",
                std::env::var("SECRET_KEY_TWO").ok(),
            )?
            .build()?
            .try_deserialize()
    }

    /// Check that every required key is present and well-formed.
    ///
    /// All problems are reported together in one `ConfigError::Message`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.environment.trim().is_empty() {
            problems.push("environment must not be empty".to_owned());
        }

        if self.server.host.trim().is_empty() {
            problems.push("server.host must not be empty".to_owned());
        }

        let db_url = self.database.url.trim();
        if db_url.is_empty() {
            problems.push("database.url is required".to_owned());
        } else if !(db_url.starts_with("postgres://") || db_url.starts_with("postgresql://")) {
            problems.push("database.url must be a postgres:// URL".to_owned());
        }

        if self.database.max_connections == 0 {
            problems.push("database.max_connections must be at least 1".to_owned());
        }
        if self.database.min_connections > self.database.max_connections {
            problems.push("database.min_connections exceeds database.max_connections".to_owned());
        }
        if self.database.health_check_interval == 0 {
            problems.push("database.health_check_interval must be at least 1".to_owned());
        }

        let reconnect = &self.database.reconnect;
        if reconnect.initial_backoff_ms > reconnect.max_backoff_ms {
            problems.push(
                "database.reconnect.initial_backoff_ms exceeds max_backoff_ms".to_owned(),
            );
        }
        if reconnect.max_retries == Some(0) {
            problems.push("database.reconnect.max_retries must be at least 1 when set".to_owned());
        }

        if self.redis.url.trim().is_empty() {
            problems.push("redis.url is required".to_owned());
        } else if let Err(e) = self.redis.url.as_str().into_connection_info() {
            problems.push(format!("redis.url is invalid: {}", e));
        }

        let client_url = self.client.url.trim();
        if client_url.is_empty() {
            problems.push("client.url is required".to_owned());
        } else if !(client_url.starts_with("http://") || client_url.starts_with("https://"))
            || HeaderValue::from_str(client_url).is_err()
        {
            problems.push("client.url must be an http(s) origin".to_owned());
        }

        for (key, secret) in [
            ("session.secret_key_one", &self.session.secret_key_one),
            ("session.secret_key_two", &self.session.secret_key_two),
        ] {
            if secret.len() < MIN_SESSION_SECRET_LENGTH {
                problems.push(format!(
                    "{} must be at least {} characters. Current length: {}",
                    key,
                    MIN_SESSION_SECRET_LENGTH,
                    secret.len()
                ));
            }
        }

        if self.http.body_limit_bytes == 0 {
            problems.push("http.body_limit_bytes must be at least 1".to_owned());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Message(problems.join("; ")))
        }
    }

    /// Whether the process runs in the development environment.
    pub fn is_development(&self) -> bool {
        self.environment == DEVELOPMENT_ENVIRONMENT
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl DatabaseSettings {
    /// Get the connection URL.
    pub fn connection_url(&self) -> &str {
        &self.url
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval)
    }
}

impl SessionSettings {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}
