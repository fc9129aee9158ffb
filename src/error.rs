// SPDX-License-Identifier: MIT

//! Application error types with HTTP response mapping.

use crate::models::TransitionError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid or expired token")]
    InvalidToken,

    /// Caller's role or identity does not permit the operation.
    #[error("Not permitted: {0}")]
    Unauthorized(String),

    /// Record is not in the state the operation expects.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Creation of a record that already exists (e.g. a second role choice).
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("AI gateway error: {0}")]
    AiGateway(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Unauthorized(_) => AppError::Unauthorized(err.to_string()),
            TransitionError::Conflict { .. } => AppError::Conflict(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            // Generic on purpose: never reveal who holds a pickup.
            AppError::Unauthorized(msg) => {
                tracing::debug!(reason = %msg, "Permission denied");
                (
                    StatusCode::FORBIDDEN,
                    "unauthorized",
                    Some("You do not have permission to perform this action.".to_string()),
                )
            }
            AppError::Conflict(msg) => {
                tracing::debug!(reason = %msg, "Conflict");
                (
                    StatusCode::CONFLICT,
                    "conflict",
                    Some("This request was already handled.".to_string()),
                )
            }
            AppError::AlreadyExists(msg) => {
                (StatusCode::CONFLICT, "already_exists", Some(msg.clone()))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                Some(msg.clone()),
            ),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::AiGateway(msg) => {
                tracing::error!(error = %msg, "AI gateway error");
                (StatusCode::BAD_GATEWAY, "ai_error", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
