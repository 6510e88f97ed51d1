//! # Configuration Module
//!
//! This module handles application configuration loading and management.
//! Configuration can be loaded from:
//! - Environment variables (prefixed with APP__, plus `DATABASE_URL`,
//!   `REDIS_HOST`, `CLIENT_URL`, `SECRET_KEY_ONE`, `SECRET_KEY_TWO`)
//! - Configuration files (config/default.toml, config/{environment}.toml)
//! - .env files (via dotenvy)
//!
//! Settings are loaded once, validated as the first startup step, and then
//! shared read-only as `Arc<Settings>`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chatty_server::config::Settings;
//!
//! let settings = Settings::load()?;
//! settings.validate()?;
//! println!("Server will listen on {}", settings.server_addr());
//! ```

mod settings;

pub use settings::*;
