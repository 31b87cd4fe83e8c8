//! Unified error handling with Sentry integration.
//!
//! All route handlers return `Result<T, AdminError>`; server-class
//! failures are captured to Sentry before the response is built.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::backend::BackendError;

/// Application-level error type for the console.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Backend API operation failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Realtime channel failed.
    #[error("Realtime error: {0}")]
    Realtime(#[from] pixelmart_realtime::RealtimeError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Backend(_) | Self::Realtime(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Backend(BackendError::NotFound(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Backend(_) | Self::Realtime(_) => StatusCode::BAD_GATEWAY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Backend payloads stay inside this process
        let message = match &self {
            Self::Backend(BackendError::NotFound(_)) | Self::NotFound(_) => {
                "Not found".to_string()
            }
            Self::Backend(_) | Self::Realtime(_) => "External service error".to_string(),
            Self::BadRequest(msg) => format!("Bad request: {msg}"),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AdminError`.
pub type Result<T> = std::result::Result<T, AdminError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AdminError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            status_of(AdminError::NotFound("order".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AdminError::BadRequest("missing field".to_string())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_backend_errors_do_not_leak_payloads() {
        let err = AdminError::Backend(BackendError::Api {
            status: 500,
            message: "secret internal state".to_string(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
