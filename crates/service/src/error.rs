//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before responding; their details are not exposed to
//! the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use order_service_core::OrderIdError;
use thiserror::Error;

use crate::service::OrderError;

/// Application-level error type for the HTTP surface.
#[derive(Debug, Error)]
pub enum AppError {
    /// Order coordinator operation failed.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<OrderIdError> for AppError {
    fn from(err: OrderIdError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Order(OrderError::DeadlineExceeded { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Order(OrderError::Repository(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Order(OrderError::DeadlineExceeded { .. }) => "Request timed out".to_string(),
            Self::Order(OrderError::Repository(_)) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
