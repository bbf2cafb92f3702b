//! HTTP error responses for the gateway API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_core::GatewayError;
use serde_json::json;

/// Error returned by HTTP handlers.
///
/// Serialized as `{"error": {"message", "type", "retryable"}}` with the
/// HTTP status carried out of band.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status for the response
    pub status: StatusCode,
    /// Human readable description
    pub message: String,
    error_type: &'static str,
    retryable: bool,
}

impl ApiError {
    /// Client sent a request the gateway cannot process
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            error_type: "protocol_error",
            retryable: false,
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            message: err.to_string(),
            error_type: err.error_type(),
            retryable: err.is_retryable(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "type": self.error_type,
                "retryable": self.retryable,
            }
        }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_maps_to_service_unavailable() {
        let err = ApiError::from(GatewayError::KeysExhausted { total: 3 });
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.retryable);
        assert_eq!(err.error_type, "exhaustion_error");
    }

    #[test]
    fn test_no_keys_maps_to_internal_error() {
        let err = ApiError::from(GatewayError::NoKeysConfigured);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.retryable);
    }

    #[test]
    fn test_upstream_connect_maps_to_bad_gateway() {
        let err = ApiError::from(GatewayError::upstream_connect("refused", Some(403)));
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.error_type, "upstream_connect_error");
        assert!(err.retryable);
    }

    #[test]
    fn test_protocol_maps_to_bad_request() {
        let err = ApiError::from(GatewayError::protocol("bad payload"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(!err.retryable);
    }

    #[test]
    fn test_bad_request_constructor() {
        let err = ApiError::bad_request("Invalid JSON");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid JSON");
        assert_eq!(err.error_type, "protocol_error");
    }
}
