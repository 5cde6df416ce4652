//! Main gateway service wiring
//!
//! `GatewayService` validates configuration into its collaborators at
//! startup and converts into an axum router with the full middleware stack
//! applied.
//!
//! ```rust,ignore
//! use portico::config::Settings;
//! use portico::gateway::GatewayService;
//!
//! let settings = Settings::new()?;
//! let router = GatewayService::new(&settings)?.into_router();
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use crate::audit::{AuditLogger, AuditSink, TracingAuditSink};
use crate::auth::{
    AllowAnyValidator, AuthState, CredentialValidator, TokenIssuer, TokenVerifier,
};
use crate::config::Settings;
use crate::error::Error;
use crate::gateway::dispatcher::Dispatcher;
use crate::gateway::handlers::{
    health_handler, hl7_message_handler, proxy_handler, token_handler,
};
use crate::gateway::headers::paths;
use crate::gateway::middleware_stack::GatewayMiddlewareStack;
use crate::gateway::rate_limit::{
    CounterStore, MemoryCounterStore, RateLimitPolicy, RateLimitState,
};
use crate::gateway::routes::RouteTable;
use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

/// Gateway service combining the route table, dispatcher, and issuer
pub struct GatewayService {
    issuer: TokenIssuer,
    routes: Arc<RouteTable>,
    dispatcher: Dispatcher,
    stack: GatewayMiddlewareStack,
}

impl GatewayService {
    /// Create a gateway with the default collaborators: pass-through
    /// credential validation, an in-process counter store, and the tracing
    /// audit sink.
    pub fn new(settings: &Settings) -> Result<Self, Error> {
        Self::with_collaborators(
            settings,
            Arc::new(AllowAnyValidator),
            Arc::new(MemoryCounterStore::default()),
            Arc::new(TracingAuditSink),
        )
    }

    /// Create a gateway with explicit collaborators. Real deployments swap
    /// in a credential store or a shared counter store here without
    /// touching the component contracts.
    pub fn with_collaborators(
        settings: &Settings,
        validator: Arc<dyn CredentialValidator>,
        counter_store: Arc<dyn CounterStore>,
        audit_sink: Arc<dyn AuditSink>,
    ) -> Result<Self, Error> {
        let routes = Arc::new(RouteTable::from_settings(settings)?);
        let verifier = Arc::new(TokenVerifier::new(
            &settings.security.jwt_secret,
            &settings.security.issuer,
        ));
        let issuer = TokenIssuer::new(
            &settings.security.jwt_secret,
            settings.security.issuer.clone(),
            settings.security.token_ttl_secs,
            validator,
        );
        let dispatcher = Dispatcher::new(Duration::from_millis(settings.proxy.timeout_ms));

        let rate_limit = RateLimitState {
            store: counter_store,
            policy: RateLimitPolicy {
                max_requests: settings.rate_limit.max_requests,
                window: Duration::from_millis(settings.rate_limit.window_ms),
            },
        };
        let audit = Arc::new(AuditLogger::new(audit_sink));
        let cors = cors_layer(&settings.security.allowed_origins)?;

        let stack = GatewayMiddlewareStack::new(
            AuthState {
                verifier,
                routes: Arc::clone(&routes),
            },
            rate_limit,
            audit,
            cors,
        );

        Ok(Self {
            issuer,
            routes,
            dispatcher,
            stack,
        })
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Create the axum router with the full middleware stack applied
    pub fn into_router(self) -> Router {
        let stack = self.stack.clone();

        let router = Router::new()
            .route(paths::HEALTH, get(health_handler))
            .route(paths::TOKEN, post(token_handler))
            .route(paths::HL7_MESSAGE, post(hl7_message_handler))
            .fallback(proxy_handler)
            .with_state(Arc::new(self));

        stack.apply_to_router(router)
    }
}

/// Build the CORS layer from the configured comma-separated origin list
fn cors_layer(allowed_origins: &str) -> Result<CorsLayer, Error> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.trim() == "*" {
        return Ok(layer.allow_origin(Any));
    }

    let origins = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|_| Error::settings(format!("invalid allowed origin: {origin}")))
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(layer.allow_origin(origins))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_builds_from_default_settings() {
        let settings = Settings::new().unwrap();
        let service = GatewayService::new(&settings);
        assert!(service.is_ok());
    }

    #[test]
    fn test_cors_layer_rejects_garbage_origin() {
        assert!(cors_layer("https://app.example.com, not a header\u{0}").is_err());
        assert!(cors_layer("https://app.example.com,https://other.example.com").is_ok());
        assert!(cors_layer("*").is_ok());
    }

    #[test]
    fn test_invalid_upstream_url_fails_startup() {
        let mut settings = Settings::new().unwrap();
        settings.upstreams.fhir.base_url = "not-a-url".to_string();
        assert!(matches!(
            GatewayService::new(&settings),
            Err(Error::Settings(_))
        ));
    }
}
