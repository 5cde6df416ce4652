//! Middleware stack builder for clean composition
//!
//! The gateway pipeline is an explicit ordered stack rather than implicit
//! fallthrough. Outer to inner: request id, security headers, CORS,
//! logging, error handling, rate limiting, audit, panic capture, auth.
//! This ordering ensures every request has an ID before anything logs it,
//! throttled requests never reach the audit layer, and authentication
//! rejections still leave an audit record.

use crate::audit::{audit_middleware, AuditLogger};
use crate::auth::{auth_gate, AuthState};
use crate::gateway::middleware::{
    error_handling_middleware, logging_middleware, panic_response, request_id_middleware,
    security_headers_middleware,
};
use crate::gateway::rate_limit::{rate_limit_middleware, RateLimitState};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

/// Builder for composing the gateway middleware stack
#[derive(Clone)]
pub struct GatewayMiddlewareStack {
    auth: AuthState,
    rate_limit: RateLimitState,
    audit: Arc<AuditLogger>,
    cors: CorsLayer,
}

impl GatewayMiddlewareStack {
    pub fn new(
        auth: AuthState,
        rate_limit: RateLimitState,
        audit: Arc<AuditLogger>,
        cors: CorsLayer,
    ) -> Self {
        Self {
            auth,
            rate_limit,
            audit,
            cors,
        }
    }

    /// Apply the complete middleware stack to a router.
    ///
    /// Layers are added innermost first.
    pub fn apply_to_router(self, router: Router) -> Router {
        router
            .layer(from_fn_with_state(self.auth, auth_gate))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(from_fn_with_state(self.audit, audit_middleware))
            .layer(from_fn_with_state(self.rate_limit, rate_limit_middleware))
            .layer(from_fn(error_handling_middleware))
            .layer(from_fn(logging_middleware))
            .layer(self.cors)
            .layer(from_fn(security_headers_middleware))
            .layer(from_fn(request_id_middleware))
    }
}
