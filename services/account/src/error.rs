//! Caller-facing error type for the account service
//!
//! Every handler and service operation reports failures as an [`AppError`].
//! Its JSON rendering only ever carries the short, generic message; any
//! detail about the underlying cause is logged where the error is created.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Custom error type for the account service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Credentials are missing or not in the expected format
    #[error("{0}")]
    Authentication(String),

    /// Credentials are well-formed but were rejected
    #[error("{0}")]
    Authorization(String),

    /// Request payload failed binding or validation
    #[error("{0}")]
    BadRequest(String),

    /// A unique resource already exists
    #[error("resource: {field} with value: {value} already exists")]
    Conflict { field: String, value: String },

    /// The requested resource does not exist
    #[error("resource: {field} with value: {value} not found")]
    NotFound { field: String, value: String },

    /// The path exists but not for this method
    #[error("method {0} is not allowed on this resource")]
    MethodNotAllowed(String),

    /// Failure not attributable to the caller
    #[error("Internal server error")]
    Internal,

    /// The service could not answer in time
    #[error("{0}")]
    ServiceUnavailable(String),
}

/// Type alias for results carrying an [`AppError`]
pub type AppResult<T> = Result<T, AppError>;

#[derive(Serialize)]
struct ErrorBody<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    message: String,
}

impl AppError {
    pub fn conflict(field: &str, value: impl Into<String>) -> Self {
        AppError::Conflict {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn not_found(field: &str, value: impl Into<String>) -> Self {
        AppError::NotFound {
            field: field.to_string(),
            value: value.into(),
        }
    }

    /// HTTP status derived from the error kind
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) | AppError::Authorization(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Stable machine-readable tag used in the response body
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Authentication(_) => "AUTHENTICATION",
            AppError::Authorization(_) => "AUTHORIZATION",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            AppError::Internal => "INTERNAL",
            AppError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": ErrorBody {
                kind: self.kind(),
                message: self.to_string(),
            },
        }));

        (self.status(), body).into_response()
    }
}
