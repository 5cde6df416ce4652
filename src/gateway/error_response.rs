//! Standardized JSON error formatting for the gateway
//!
//! Every error leaving the gateway uses the same `{error, message?,
//! requestId?}` shape. Upstream failures are surfaced generically; the
//! detailed cause goes to the logs only.

use crate::gateway::types::{GatewayError, InternalErrorMarker};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Standard error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error category or fixed client-facing message
    pub error: String,
    /// Optional human-readable detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Request ID for correlation, set for internal errors
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            request_id: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The generic internal error body, correlated by request id
    pub fn internal(request_id: impl Into<String>) -> Self {
        Self {
            error: "Internal server error".to_string(),
            message: None,
            request_id: Some(request_id.into()),
        }
    }
}

/// Extension trait for consistent error formatting
pub trait ErrorResponseExt {
    fn to_error_response(&self) -> ErrorResponse;
    fn status_code(&self) -> StatusCode;
}

impl ErrorResponseExt for GatewayError {
    fn to_error_response(&self) -> ErrorResponse {
        use GatewayError::*;

        match self {
            Validation { field, message } => ErrorResponse::new("invalid_request")
                .with_message(format!("{field}: {message}")),
            UnsupportedGrantType(grant) => ErrorResponse::new("unsupported_grant_type")
                .with_message(format!("grant type '{grant}' is not supported")),
            InvalidClient => {
                ErrorResponse::new("invalid_client").with_message("Client credentials were rejected")
            }
            MissingToken => ErrorResponse::new("Access token required"),
            InvalidToken => ErrorResponse::new("Invalid or expired token"),
            RateLimited => ErrorResponse::new("Too many requests, please try again later"),
            NotFound => ErrorResponse::new("Endpoint not found"),
            UpstreamUnavailable { .. } => ErrorResponse::new("upstream_unavailable")
                .with_message("Upstream service is temporarily unavailable"),
            UpstreamTimeout(_) => ErrorResponse::new("upstream_timeout")
                .with_message("Upstream service did not respond in time"),
            Internal(_) => ErrorResponse::new("Internal server error"),
        }
    }

    fn status_code(&self) -> StatusCode {
        use GatewayError::*;

        match self {
            Validation { .. } | UnsupportedGrantType(_) => StatusCode::BAD_REQUEST,
            InvalidClient | MissingToken => StatusCode::UNAUTHORIZED,
            InvalidToken => StatusCode::FORBIDDEN,
            NotFound => StatusCode::NOT_FOUND,
            RateLimited => StatusCode::TOO_MANY_REQUESTS,
            UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error conversion for axum responses using the standardized format
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let internal = matches!(self, GatewayError::Internal(_));
        let mut response = (status, Json(self.to_error_response())).into_response();
        if internal {
            // The error middleware rewrites marked responses with the
            // request id and logs the detail.
            response.extensions_mut().insert(InternalErrorMarker);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_token_shape() {
        let error = GatewayError::MissingToken;
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
        let body = error.to_error_response();
        assert_eq!(body.error, "Access token required");
        assert!(body.message.is_none());
    }

    #[test]
    fn test_not_found_shape() {
        let error = GatewayError::NotFound;
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(error.to_error_response().error, "Endpoint not found");
    }

    #[test]
    fn test_upstream_errors_do_not_leak_target() {
        let error = GatewayError::UpstreamUnavailable {
            upstream: "http://fhir.internal:8081".to_string(),
        };
        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);
        let body = serde_json::to_string(&error.to_error_response()).unwrap();
        assert!(!body.contains("fhir.internal"));
        assert!(body.contains("upstream_unavailable"));
    }

    #[test]
    fn test_internal_error_is_marked() {
        let response = GatewayError::Internal("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<InternalErrorMarker>().is_some());
    }

    #[test]
    fn test_relayable_errors_are_not_marked() {
        let response = GatewayError::NotFound.into_response();
        assert!(response.extensions().get::<InternalErrorMarker>().is_none());
    }

    #[test]
    fn test_error_response_serialization_skips_empty_fields() {
        let json = serde_json::to_string(&ErrorResponse::new("Endpoint not found")).unwrap();
        assert_eq!(json, r#"{"error":"Endpoint not found"}"#);

        let json = serde_json::to_string(&ErrorResponse::internal("req-1")).unwrap();
        assert!(json.contains(r#""requestId":"req-1""#));
    }
}
