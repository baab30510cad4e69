//! API error types and their JSON responses.
//!
//! Every failure leaving a handler is an [`ApiError`], rendered as
//! `{ "error": ..., "code": ..., "details"?: ... }` with a matching status.

use axum::{
    extract::multipart::MultipartError,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;
use crate::SpatialError;

/// API error type that converts to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("{resource_type} not found: {id}")]
    NotFound {
        /// Entity kind
        resource_type: String,
        /// Requested id
        id: String,
    },

    /// Malformed request (400)
    #[error("{message}")]
    BadRequest {
        /// Description
        message: String,
    },

    /// Conflict with an existing resource (409)
    #[error("{message}")]
    Conflict {
        /// Description
        message: String,
    },

    /// Request body too large (413)
    #[error("{message}")]
    PayloadTooLarge {
        /// Description
        message: String,
    },

    /// Internal server error (500)
    #[error("Internal error: {message}")]
    Internal {
        /// Description
        message: String,
    },

    /// Service unavailable (503)
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Description
        message: String,
    },
}

impl ApiError {
    /// Not-found error for an entity kind
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::Conflict { .. } => "CONFLICT",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::Internal { .. } => "INTERNAL_ERROR",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::not_found(entity, id),
            StoreError::Validation(message) => Self::BadRequest { message },
            StoreError::Conflict(message) => Self::Conflict { message },
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<SpatialError> for ApiError {
    fn from(err: SpatialError) -> Self {
        match err {
            SpatialError::Store(store) => store.into(),
            SpatialError::NotFound { entity, id } => Self::not_found(entity, id),
            SpatialError::Validation(message) => Self::BadRequest { message },
            SpatialError::Config(message) => Self::internal(message),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal(format!("Blocking task failed: {err}"))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge {
                message: "File too large".to_string(),
            }
        } else {
            Self::bad_request(format!("Invalid multipart body: {}", err.body_text()))
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
    /// Machine-readable error code
    pub code: String,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

/// Additional error details.
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    /// Resource type involved
    pub resource_type: String,
    /// Resource ID involved
    pub resource_id: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let details = match &self {
            ApiError::NotFound { resource_type, id } => Some(ErrorDetails {
                resource_type: resource_type.clone(),
                resource_id: id.clone(),
            }),
            _ => None,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "API error");
        } else {
            tracing::warn!(error = %self, "API error");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: self.error_code().to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
