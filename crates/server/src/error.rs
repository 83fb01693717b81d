// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use taskgate_core::{AuthError, LaunchError};
use thiserror::Error;

/// Structured JSON error response for API errors.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Token rejection. Always surfaces before any job is created or
    /// touched.
    #[error("auth failed: {0}")]
    Auth(#[from] AuthError),

    /// Deliberately covers every unresolved `(session, job)` key: unknown
    /// id, foreign session, or an already-consumed result. Callers cannot
    /// tell these apart.
    #[error("no such job for this session: {0}")]
    JobNotFound(String),

    #[error("unknown tool: {0}")]
    ToolNotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<LaunchError> for ApiError {
    fn from(err: LaunchError) -> Self {
        match err {
            LaunchError::Auth(auth) => Self::Auth(auth),
            LaunchError::InvalidParams(msg) => Self::BadRequest(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::Auth(auth_err) => {
                tracing::warn!(error = %auth_err, "token rejected");
                (
                    StatusCode::UNAUTHORIZED,
                    ErrorResponse::with_details("auth failed", auth_err.to_string()),
                )
            }
            ApiError::JobNotFound(job_id) => {
                tracing::debug!(job_id = %job_id, "job not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::new("no such job for this session"),
                )
            }
            ApiError::ToolNotFound(name) => {
                tracing::debug!(tool = %name, "tool not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("unknown tool", name.clone()),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("bad request", msg.clone()),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
