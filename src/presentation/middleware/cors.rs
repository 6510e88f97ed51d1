//! CORS Middleware Configuration

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::CorsLayer;

use crate::config::ClientSettings;

/// Create CORS layer allowing the configured client origin, with credentials
pub fn create_cors_layer(settings: &ClientSettings) -> CorsLayer {
    let origin = match settings.url.trim_end_matches('/').parse::<HeaderValue>() {
        Ok(origin) => origin,
        Err(e) => {
            // Settings are validated at startup; deny every origin rather than panic.
            tracing::warn!(target: "server", error = %e, "Invalid client origin, cross-origin requests disabled");
            return CorsLayer::new();
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600)) // 1 hour default
}
