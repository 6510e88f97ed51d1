//! Application Error Types
//!
//! Centralized error handling with Axum integration.
//!
//! [`AppError`] is the closed set of errors a handler may raise on purpose.
//! Each variant fixes its own status code and status label, and renders to
//! the `{message, status, statusCode}` wire shape. Anything else a handler
//! fails with travels as [`ApiError::Unrecognized`] and is never shown to the
//! caller verbatim.
//!
//! Handler errors are not rendered where they are raised: `into_response`
//! tags the response with an [`InterceptedError`] extension, and the error
//! boundary middleware logs it and produces the final response.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Status label carried by every application error.
pub const ERROR_STATUS: &str = "error";

/// Body returned for errors that must not be exposed to the caller.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Application error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    /// Request schema or field validation failed.
    #[error("{0}")]
    Validation(String),

    /// The request was malformed.
    #[error("{0}")]
    BadRequest(String),

    /// The requested resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Authentication or authorization failed.
    #[error("{0}")]
    NotAuthorized(String),

    /// The request payload exceeded the size ceiling.
    #[error("{0}")]
    FileTooLarge(String),

    /// A dependency the request needs is unavailable.
    #[error("{0}")]
    ServerError(String),
}

/// Error response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ErrorResponse {
    pub message: String,
    pub status: String,
    pub status_code: u16,
}

/// Body returned for requests that matched no route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotFoundResponse {
    pub message: String,
}

impl AppError {
    /// HTTP status fixed by the variant.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotAuthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::FileTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::ServerError(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Status label fixed by the variant.
    pub fn status(&self) -> &'static str {
        ERROR_STATUS
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::NotAuthorized(msg)
            | AppError::FileTooLarge(msg)
            | AppError::ServerError(msg) => msg,
        }
    }

    /// Short machine-readable name, used as a log field and metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::NotAuthorized(_) => "not_authorized",
            AppError::FileTooLarge(_) => "file_too_large",
            AppError::ServerError(_) => "server_error",
        }
    }

    /// Wire representation: exactly `{message, status, statusCode}`.
    pub fn serialize_errors(&self) -> ErrorResponse {
        ErrorResponse {
            message: self.message().to_owned(),
            status: self.status().to_owned(),
            status_code: self.status_code().as_u16(),
        }
    }
}

/// Any error a request handler can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A recognized application error, safe to expose.
    #[error(transparent)]
    Application(#[from] AppError),

    /// Anything else: a defect or an unexpected dependency failure.
    #[error(transparent)]
    Unrecognized(#[from] anyhow::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Unrecognized(err.into())
    }
}

impl From<redis::RedisError> for ApiError {
    fn from(err: redis::RedisError) -> Self {
        ApiError::Unrecognized(err.into())
    }
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Application(err) => err.kind(),
            ApiError::Unrecognized(_) => "unrecognized",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Application(err) => err.status_code(),
            ApiError::Unrecognized(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body sent to the caller. Unrecognized errors get a generic message.
    pub fn body(&self) -> ErrorResponse {
        match self {
            ApiError::Application(err) => err.serialize_errors(),
            ApiError::Unrecognized(_) => ErrorResponse {
                message: INTERNAL_ERROR_MESSAGE.to_owned(),
                status: ERROR_STATUS.to_owned(),
                status_code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            },
        }
    }

    /// Render the final response for this error.
    pub fn render(&self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

/// Response extension carrying a handler error to the error boundary.
#[derive(Debug, Clone)]
pub struct InterceptedError(pub Arc<ApiError>);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.render();
        response
            .extensions_mut()
            .insert(InterceptedError(Arc::new(self)));
        response
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        ApiError::Application(self).into_response()
    }
}
