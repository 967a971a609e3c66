//! Unified error handling for the API.

use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use workorder_core::{Email, UserId};

use crate::db::RepositoryError;
use crate::integrations::{AuthError, DeliveryError};
use crate::services::{DispatchError, ServiceError};

/// Application-level error type for API handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Outbound delivery failed where delivery is the point of the request.
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// No credential on the request.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Credential rejected, unknown user, or insufficient role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with the current state of the resource.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => Self::BadRequest(msg),
            ServiceError::NotFound => Self::NotFound("Work order not found".to_string()),
            ServiceError::InvalidTransition(msg) => Self::Conflict(msg),
            ServiceError::Store(e) => Self::Database(e),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotFound => Self::NotFound("Work order not found".to_string()),
            DispatchError::Store(e) => Self::Database(e),
            DispatchError::Delivery(e) => Self::Delivery(e),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Missing => Self::Unauthorized("Access token required".to_string()),
            AuthError::Invalid | AuthError::UnknownUser => {
                Self::Forbidden("Invalid token".to_string())
            }
            AuthError::Forbidden => Self::Forbidden("Insufficient permissions".to_string()),
            AuthError::Provider(msg) => Self::Internal(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        Self::BadRequest("Invalid input data".to_string())
    }
}

/// `Json` extractor whose rejections are reported as [`AppError::BadRequest`].
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(self, Self::Database(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "API request error"
            );
        } else if let Self::Delivery(e) = &self {
            tracing::warn!(error = %e, "Delivery failed");
        }

        let status = match &self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Delivery(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
        };

        // Don't expose internal error details to clients
        let message = match self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Delivery(_) => "Failed to send notification".to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg,
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Set the Sentry user context for the current request.
pub fn set_sentry_user(user_id: UserId, email: &Email) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: Some(email.to_string()),
            ..Default::default()
        }));
    });
}
