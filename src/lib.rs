//! # Chatty Server Library
//!
//! Bootstrap of the Chatty real-time chat backend:
//! - HTTP server with a uniform error model and a single error boundary
//! - WebSocket hub scaled across processes through Redis pub/sub
//! - Supervised PostgreSQL connection with bounded reconnects
//!
//! ## Module Structure
//!
//! ```text
//! chatty_server/
//! +-- config/         Settings loading and validation
//! +-- infrastructure/ Database supervisor, pub/sub transport, metrics
//! +-- presentation/   HTTP routes, middleware and WebSocket hub
//! +-- shared/         Error model
//! +-- startup         Startup sequence and application state
//! +-- telemetry       Logging setup
//! ```

// Configuration module
pub mod config;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
