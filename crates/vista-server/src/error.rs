//! API error handling.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use vista_types::CapabilityError;

/// HTTP-facing error with the `{"detail": "..."}` envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "detail": self.detail }));
        (self.status, body).into_response()
    }
}

impl From<CapabilityError> for ApiError {
    fn from(err: CapabilityError) -> Self {
        let status = match &err {
            CapabilityError::InvalidPayload(_) | CapabilityError::UnsupportedCapability(_) => {
                StatusCode::BAD_REQUEST
            }
            CapabilityError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            CapabilityError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CapabilityError::Provider { .. } => StatusCode::BAD_GATEWAY,
            CapabilityError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_taxonomy_status_mapping() {
        let cases = [
            (CapabilityError::InvalidPayload("x".into()), StatusCode::BAD_REQUEST),
            (
                CapabilityError::UnsupportedCapability("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (CapabilityError::TaskNotFound("x".into()), StatusCode::NOT_FOUND),
            (
                CapabilityError::Timeout {
                    elapsed: Duration::from_secs(2),
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (CapabilityError::provider("x", true), StatusCode::BAD_GATEWAY),
            (CapabilityError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }
}
