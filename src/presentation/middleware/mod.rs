//! Middleware
//!
//! Tower middleware for request processing.

pub mod cors;
pub mod error_boundary;
pub mod logging;
pub mod security;
pub mod session;

pub use cors::create_cors_layer;
pub use error_boundary::{install_error_boundary, not_found};
pub use logging::{create_trace_layer, track_metrics};
pub use security::{create_security_headers_layer, SecurityHeadersConfig, SecurityHeadersLayer};
pub use session::{session_middleware, Session, SessionKeys, SESSION_COOKIE};
