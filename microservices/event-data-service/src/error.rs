//! Error types for Event Data Service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pulse_core::PulseError;
use serde_json::json;
use validator::ValidationErrors;

use crate::query::StoreError;

/// Result type alias
pub type Result<T> = std::result::Result<T, ApiError>;

/// Terminal outcomes of a values request
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request parameters")]
    Validation(ValidationErrors),

    #[error("Not authorized to view this website")]
    Unauthorized,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl ApiError {
    /// Platform-wide classification of this error
    pub fn kind(&self) -> PulseError {
        match self {
            ApiError::Validation(_) => PulseError::Validation(self.to_string()),
            ApiError::Unauthorized => PulseError::Unauthorized(self.to_string()),
            ApiError::MethodNotAllowed => PulseError::MethodNotAllowed(self.to_string()),
            ApiError::Storage(_) => PulseError::Storage(self.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status =
            StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let (message, details) = match &self {
            ApiError::Validation(errors) => (self.to_string(), serde_json::to_value(errors).ok()),
            ApiError::Storage(_) => {
                tracing::error!(error = %self, "Event data query failed");
                ("Internal server error".to_string(), None)
            }
            _ => (self.to_string(), None),
        };

        let body = Json(json!({
            "error": message,
            "type": kind.error_code(),
            "code": status.as_u16(),
            "details": details,
        }));

        (status, body).into_response()
    }
}
