use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sentrydash_occupancy::ErrorKind;
use serde::Serialize;
use tracing::error;

use crate::error::ServiceError;

/// Error body returned by every endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Coarse, stable error class.
    pub kind: &'static str,
    /// Fine-grained, stable error code.
    pub code: String,
    pub request_id: String,
    pub retryable: bool,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: Box<ErrorBody>,
}

impl ApiError {
    fn new(
        status: StatusCode,
        kind: &'static str,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            body: Box::new(ErrorBody {
                error: message.into(),
                kind,
                code: code.into(),
                request_id: "unknown".to_string(),
                retryable: false,
            }),
        }
    }

    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ErrorKind::Validation.as_str(),
            code,
            message,
        )
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            ErrorKind::NotFound.as_str(),
            code,
            message,
        )
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, ErrorKind::Conflict.as_str(), code, message)
            .with_retryable(true)
    }

    pub fn service_unavailable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Dependency.as_str(),
            code,
            message,
        )
        .with_retryable(true)
    }

    pub fn gateway_timeout(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Dependency.as_str(),
            code,
            message,
        )
        .with_retryable(true)
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.body.request_id = request_id.into();
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.body.retryable = retryable;
        self
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let code = err.code();
        match err.kind() {
            ErrorKind::Validation => ApiError::bad_request(code, err.to_string()),
            ErrorKind::NotFound => ApiError::not_found(code, err.to_string()),
            ErrorKind::Conflict => ApiError::conflict(code, err.to_string()),
            ErrorKind::Dependency if err.is_timeout() => {
                error!(error = %err, "Store operation timed out");
                ApiError::gateway_timeout(code, "The room store did not respond in time")
            }
            ErrorKind::Dependency => {
                error!(error = %err, "Store operation failed");
                ApiError::service_unavailable(code, "The room store is unavailable")
                    .with_retryable(err.is_retryable())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
