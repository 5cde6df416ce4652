//! Middleware implementations for the gateway pipeline

use crate::gateway::error_response::ErrorResponse;
use crate::gateway::headers::X_REQUEST_ID;
use crate::gateway::types::InternalErrorMarker;
use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::any::Any;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

/// Request ID middleware - ensures every request has a unique ID for tracing
///
/// An inbound `x-request-id` is kept only when it parses as a UUID; any
/// other value is rejected and replaced with a generated v7 value, so a
/// caller cannot smuggle arbitrary strings into logs and audit records.
/// The ID is echoed on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::now_v7)
        .to_string();

    // UUID strings are always valid ASCII header values
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        request.headers_mut().insert(X_REQUEST_ID, value.clone());
        let mut response = next.run(request).await;
        response.headers_mut().insert(X_REQUEST_ID, value);
        response
    } else {
        next.run(request).await
    }
}

/// Fixed security headers applied to every response, not per route
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'"),
    );
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    response
}

/// Logging middleware - logs request/response details with timing
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    info!(
        request_id = request_id,
        method = %method,
        path = %uri.path(),
        "Incoming request"
    );

    let response = next.run(request).await;
    let duration = start.elapsed();

    info!(
        request_id = request_id,
        method = %method,
        path = %uri.path(),
        status = response.status().as_u16(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}

/// Error handling middleware - formats internal errors without leaking detail
///
/// Responses carrying [`InternalErrorMarker`] (panics, internal failures)
/// are replaced with the generic shape plus the request id. Upstream 5xx
/// responses relayed by the dispatcher carry no marker and pass through
/// untouched, preserving transparent proxying.
pub async fn error_handling_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let response = next.run(request).await;

    if response.extensions().get::<InternalErrorMarker>().is_some() {
        error!(
            request_id = request_id,
            status = response.status().as_u16(),
            "request failed with internal error"
        );
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::internal(request_id)),
        )
            .into_response();
    }

    response
}

/// Panic handler for the catch-panic layer: logs the panic and produces a
/// marked 500 for the error middleware to reformat.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %detail, "request handler panicked");

    let mut response = (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Internal server error")),
    )
        .into_response();
    response.extensions_mut().insert(InternalErrorMarker);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::middleware::from_fn;
    use tower::ServiceExt;

    fn ok_service() -> axum::routing::MethodRouter {
        axum::routing::get(|| async { StatusCode::OK })
    }

    #[tokio::test]
    async fn test_request_id_generated_when_absent() {
        let app = axum::Router::new()
            .route("/test", ok_service())
            .layer(from_fn(request_id_middleware));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let id = response.headers().get(X_REQUEST_ID).unwrap();
        let uuid = Uuid::parse_str(id.to_str().unwrap()).unwrap();
        assert_eq!(uuid.get_version_num(), 7);
    }

    #[tokio::test]
    async fn test_request_id_preserved_when_valid() {
        let app = axum::Router::new()
            .route("/test", ok_service())
            .layer(from_fn(request_id_middleware));

        let inbound = Uuid::now_v7().to_string();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/test")
                    .header(X_REQUEST_ID, &inbound)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(X_REQUEST_ID).unwrap().to_str().unwrap(),
            inbound
        );
    }

    #[tokio::test]
    async fn test_request_id_replaced_when_not_a_uuid() {
        let app = axum::Router::new()
            .route("/test", ok_service())
            .layer(from_fn(request_id_middleware));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/test")
                    .header(X_REQUEST_ID, "'; DROP TABLE audit; --")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let id = response.headers().get(X_REQUEST_ID).unwrap();
        let uuid = Uuid::parse_str(id.to_str().unwrap()).unwrap();
        assert_eq!(uuid.get_version_num(), 7);
    }

    #[tokio::test]
    async fn test_security_headers_applied() {
        let app = axum::Router::new()
            .route("/test", ok_service())
            .layer(from_fn(security_headers_middleware));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert!(headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
        assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY));
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
    }

    #[tokio::test]
    async fn test_marked_response_is_reformatted_with_request_id() {
        let app = axum::Router::new()
            .route(
                "/boom",
                axum::routing::get(|| async {
                    let mut response =
                        (StatusCode::INTERNAL_SERVER_ERROR, "raw detail").into_response();
                    response.extensions_mut().insert(InternalErrorMarker);
                    response
                }),
            )
            .layer(from_fn(error_handling_middleware));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/boom")
                    .header(X_REQUEST_ID, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
        assert_eq!(json["requestId"], "req-42");
        assert!(json.get("detail").is_none());
    }

    #[tokio::test]
    async fn test_unmarked_error_response_passes_through() {
        let app = axum::Router::new()
            .route(
                "/relay",
                axum::routing::get(|| async {
                    (StatusCode::INTERNAL_SERVER_ERROR, "upstream said so").into_response()
                }),
            )
            .layer(from_fn(error_handling_middleware));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/relay")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"upstream said so");
    }
}
