//! Mapping from crate errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::pages;
use crate::error::{ErrorCategory, ErrorCode, VoxError};
use crate::queue::JobId;

/// Error returned by the JSON and audio endpoints.
///
/// Failures always carry a non-2xx status so clients can tell success from
/// failure without inspecting the body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: ErrorCode,
    pub message: String,
    pub job_id: Option<JobId>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorPayload<'a>,
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    message: &'a str,
    code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_id: Option<JobId>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            job_id: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ErrorCode::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal, message)
    }

    /// A job that exhausted its retries.
    pub fn dead_lettered(message: impl Into<String>, code: Option<ErrorCode>) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            code.unwrap_or(ErrorCode::EngineFailure),
            message,
        )
    }

    pub fn with_job(mut self, id: JobId) -> Self {
        self.job_id = Some(id);
        self
    }
}

impl From<VoxError> for ApiError {
    fn from(err: VoxError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::warn!(error = %err, status = status.as_u16(), "request failed");
        }
        Self::new(status, err.code(), err.to_string())
    }
}

fn status_for(err: &VoxError) -> StatusCode {
    match err {
        VoxError::EmptyTask | VoxError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        VoxError::QueueFull { .. } | VoxError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
        VoxError::JobNotFound(_) => StatusCode::NOT_FOUND,
        VoxError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => match err.category() {
            ErrorCategory::Authentication
            | ErrorCategory::RateLimit
            | ErrorCategory::Network
            | ErrorCategory::Server
            | ErrorCategory::Api => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: ErrorPayload {
                message: &self.message,
                code: self.code,
                job_id: self.job_id,
            },
        });
        (self.status, body).into_response()
    }
}

/// Same mapping as [`ApiError`], rendered as an HTML page for the form routes.
#[derive(Debug)]
pub struct PageError(pub ApiError);

impl From<VoxError> for PageError {
    fn from(err: VoxError) -> Self {
        Self(ApiError::from(err))
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        (self.0.status, Html(pages::error(&self.0.message))).into_response()
    }
}
