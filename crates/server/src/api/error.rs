use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use prpkg_core::ServiceError;
use serde::Serialize;
use tracing::error;

/// Error body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: bool,
    pub message: String,
}

/// Service error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl ApiError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self(ServiceError::MalformedRequest(message.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self(ServiceError::NotFound(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::GATEWAY_TIMEOUT {
            error!("Request failed: {}", self.0);
        }

        let body = ErrorResponse {
            error: true,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
