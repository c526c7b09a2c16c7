//! Error handling for the API server

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use docforge::{DocforgeError, FailureKind, GenerationOutcome};
use serde_json::json;
use thiserror::Error;

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Generation { kind: FailureKind, message: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Docforge error: {0}")]
    Docforge(#[from] DocforgeError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Generation { kind, .. } => match kind {
                FailureKind::TemplateNotFound | FailureKind::TemplateFileMissing => {
                    StatusCode::NOT_FOUND
                }
                FailureKind::Rendering | FailureKind::Conversion => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                FailureKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) | ApiError::Serialization(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Generation { kind, .. } => kind.as_str(),
            ApiError::BadRequest(_) | ApiError::Serialization(_) => "bad-request",
            ApiError::Config(_) => "config",
            _ => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            ApiError::Generation { .. } | ApiError::BadRequest(_) => self.to_string(),
            ApiError::Serialization(_) => "Invalid JSON format".to_string(),
            ApiError::Config(_) => "Configuration error".to_string(),
            _ => "Internal server error".to_string(),
        };

        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "{}", self);
        }

        let body = Json(json!({
            "error": error_message,
            "kind": self.kind(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<GenerationOutcome> for ApiError {
    fn from(outcome: GenerationOutcome) -> Self {
        ApiError::Generation {
            kind: outcome.failure.unwrap_or(FailureKind::Internal),
            message: outcome.message,
        }
    }
}

// Convenience functions for common errors
impl ApiError {
    pub fn bad_request(msg: &str) -> Self {
        Self::BadRequest(msg.to_string())
    }

    pub fn internal(msg: &str) -> Self {
        Self::Internal(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_failures_map_to_status_codes() {
        let cases = [
            (FailureKind::TemplateNotFound, StatusCode::NOT_FOUND),
            (FailureKind::TemplateFileMissing, StatusCode::NOT_FOUND),
            (FailureKind::Rendering, StatusCode::UNPROCESSABLE_ENTITY),
            (FailureKind::Conversion, StatusCode::UNPROCESSABLE_ENTITY),
            (FailureKind::Timeout, StatusCode::GATEWAY_TIMEOUT),
            (FailureKind::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (kind, status) in cases {
            let error = ApiError::Generation {
                kind,
                message: "x".to_string(),
            };
            assert_eq!(error.status(), status, "{kind}");
            assert_eq!(error.kind(), kind.as_str());
        }
        assert_eq!(ApiError::bad_request("no").status(), StatusCode::BAD_REQUEST);
    }
}
