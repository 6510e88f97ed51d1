//! # Chatty Server
//!
//! This is the application entry point that initializes:
//! - Configuration loading
//! - Tracing/logging subsystem
//! - Database connection supervisor
//! - HTTP/WebSocket server and its Redis pub/sub adapter
//!
//! Exits with status 1 when any startup step fails or the database
//! connection is lost for good.

use anyhow::Result;
use tracing::{error, info};

use chatty_server::config::{LogSettings, Settings};
use chatty_server::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment and config files
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            chatty_server::telemetry::init_tracing(&LogSettings::default());
            error!(target: "server", error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    // Initialize tracing subscriber for structured logging
    chatty_server::telemetry::init_tracing(&settings.log);

    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        "Starting Chatty Server"
    );

    // Build and run the application
    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    info!("Server stopped");
    Ok(())
}
