//! Error types for rollcall-mentor
//!
//! Every failure leaves the service as `{"error": message}` with an optional
//! `details` field. Internal details are only exposed in debug builds.

use crate::services::DispatchError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Wrong HTTP method (405)
    #[error("Method Not Allowed")]
    MethodNotAllowed,

    /// Collaborator rejected the request (502)
    #[error("{message}")]
    Upstream {
        message: String,
        details: Option<String>,
    },

    /// Internal server error (500)
    #[error("{message}")]
    Internal {
        message: String,
        details: Option<String>,
    },

    /// rollcall-common error
    #[error(transparent)]
    Common(#[from] rollcall_common::Error),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotConfigured(reason) => ApiError::Internal {
                message: "SMS gateway is not configured".to_string(),
                details: Some(reason),
            },
            DispatchError::Invalid(reason) => ApiError::BadRequest(reason),
            DispatchError::Network(reason) => ApiError::Upstream {
                message: "Failed to reach SMS gateway".to_string(),
                details: Some(reason),
            },
            DispatchError::Api { status, body } => ApiError::Upstream {
                message: "SMS gateway rejected the message".to_string(),
                details: Some(format!("{}: {}", status, body)),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use rollcall_common::Error as CommonError;

        let (status, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method Not Allowed".to_string(),
                None,
            ),
            // Upstream details are the gateway's own words, always shown
            ApiError::Upstream { message, details } => (StatusCode::BAD_GATEWAY, message, details),
            ApiError::Internal { message, details } => {
                (StatusCode::INTERNAL_SERVER_ERROR, message, debug_only(details))
            }
            ApiError::Common(err) => match err {
                CommonError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg, None),
                CommonError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
                CommonError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
                other => {
                    tracing::error!(error = %other, "Request failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                        debug_only(Some(other.to_string())),
                    )
                }
            },
        };

        let body = match details {
            Some(details) => json!({ "error": message, "details": details }),
            None => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

fn debug_only(details: Option<String>) -> Option<String> {
    if cfg!(debug_assertions) {
        details
    } else {
        None
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
