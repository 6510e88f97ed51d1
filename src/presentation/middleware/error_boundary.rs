//! Error Boundary
//!
//! The last stop for every request. Requests that match no route get the
//! 404 `{message}` body; errors raised by handlers, extractors or panics are
//! logged once and rendered into the uniform error body.
//!
//! Install it with [`install_error_boundary`] after every real route has
//! been added, otherwise the fallback shadows routes added later.

use std::any::Any;

use axum::{
    body::Body,
    extract::{OriginalUri, Request},
    http::{Response as HttpResponse, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Json, Router,
};
use tower_http::catch_panic::CatchPanicLayer;

use crate::infrastructure::metrics;
use crate::shared::error::{ApiError, InterceptedError, NotFoundResponse};

/// Add the 404 fallback, panic capture and the error boundary to `router`.
pub fn install_error_boundary<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(error_boundary))
}

/// Fallback for requests that matched no route.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    let original_url = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| uri.path().to_owned());

    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            message: format!("{} not found", original_url),
        }),
    )
}

/// Intercept the error attached to a handler response and render it.
pub async fn error_boundary(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let mut response = next.run(request).await;
    let Some(InterceptedError(error)) = response.extensions_mut().remove::<InterceptedError>()
    else {
        return response;
    };

    match error.as_ref() {
        ApiError::Application(err) => {
            tracing::error!(
                target: "error_boundary",
                %method,
                %uri,
                kind = err.kind(),
                status = err.status_code().as_u16(),
                error = %err,
                "Request failed"
            );
        }
        ApiError::Unrecognized(err) => {
            tracing::error!(
                target: "error_boundary",
                %method,
                %uri,
                error = ?err,
                "Unhandled error while processing request"
            );
        }
    }
    metrics::record_intercepted_error(error.kind());

    error.render()
}

/// Turn a handler panic into an unrecognized error for the boundary.
fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> HttpResponse<Body> {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "unknown panic payload".to_owned()
    };

    ApiError::Unrecognized(anyhow::anyhow!("handler panicked: {}", detail)).into_response()
}
