//! Audit trail for every processed request
//!
//! One combined record is emitted per request that clears the rate limiter,
//! after the response resolves: the pre-dispatch intent (method, path,
//! caller) and the post-dispatch outcome travel together. Writing the record
//! is fire-and-forget; a failing sink increments an internal counter and
//! never delays or fails the HTTP response.

use crate::auth::Principal;
use crate::gateway::headers::{client_ip, X_REQUEST_ID};
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// How a processed request ended, classified from the response status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    InvalidRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    ClientError,
    ServerError,
    UpstreamUnavailable,
    UpstreamTimeout,
}

impl Outcome {
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::BAD_REQUEST => Self::InvalidRequest,
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::FORBIDDEN => Self::Forbidden,
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::BAD_GATEWAY => Self::UpstreamUnavailable,
            StatusCode::GATEWAY_TIMEOUT => Self::UpstreamTimeout,
            s if s.is_client_error() => Self::ClientError,
            s if s.is_server_error() => Self::ServerError,
            _ => Self::Success,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::InvalidRequest => "invalid_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::ClientError => "client_error",
            Self::ServerError => "server_error",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::UpstreamTimeout => "upstream_timeout",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of who accessed what, when, and with what outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub caller_ip: String,
    pub user_agent: String,
    pub principal_id: Option<String>,
    pub outcome: Outcome,
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit sink write failed: {0}")]
    Sink(String),
}

/// Destination for audit records; ownership of a record ends here
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// Default sink: emits each record as a structured tracing event on the
/// dedicated `audit` target so operators can route it separately.
#[derive(Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        info!(
            target: "audit",
            timestamp = %record.timestamp.to_rfc3339(),
            request_id = %record.request_id,
            method = %record.method,
            path = %record.path,
            caller_ip = %record.caller_ip,
            user_agent = %record.user_agent,
            principal_id = record.principal_id.as_deref().unwrap_or("-"),
            outcome = %record.outcome,
            "request processed"
        );
        Ok(())
    }
}

/// In-memory sink that retains records; used by tests and embedders
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Fire-and-forget wrapper around a sink with a failure counter
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
    failures: AtomicU64,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            failures: AtomicU64::new(0),
        }
    }

    /// Write a record; sink failures are counted and logged, never surfaced.
    pub fn record(&self, record: AuditRecord) {
        if let Err(err) = self.sink.record(&record) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            warn!(error = %err, "failed to write audit record");
        }
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Audit middleware - emits one combined record after the response resolves
///
/// Sits inside the rate limiter (throttled requests are not audited) and
/// outside the auth gate, so rejected authentications still leave exactly
/// one record noting the rejection category.
pub async fn audit_middleware(
    State(logger): State<Arc<AuditLogger>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let caller_ip = client_ip(&request);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("")
        .to_string();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let response = next.run(request).await;

    let principal_id = response
        .extensions()
        .get::<Principal>()
        .map(|p| p.client_id.clone());

    logger.record(AuditRecord {
        timestamp: Utc::now(),
        request_id,
        method,
        path,
        caller_ip,
        user_agent,
        principal_id,
        outcome: Outcome::from_status(response.status()),
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn record(&self, _record: &AuditRecord) -> Result<(), AuditError> {
            Err(AuditError::Sink("disk full".to_string()))
        }
    }

    fn record(outcome: Outcome) -> AuditRecord {
        AuditRecord {
            timestamp: Utc::now(),
            request_id: "r1".to_string(),
            method: "GET".to_string(),
            path: "/fhir/Patient".to_string(),
            caller_ip: "10.0.0.1".to_string(),
            user_agent: "test".to_string(),
            principal_id: Some("c1".to_string()),
            outcome,
        }
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(Outcome::from_status(StatusCode::OK), Outcome::Success);
        assert_eq!(Outcome::from_status(StatusCode::ACCEPTED), Outcome::Success);
        assert_eq!(
            Outcome::from_status(StatusCode::UNAUTHORIZED),
            Outcome::Unauthorized
        );
        assert_eq!(
            Outcome::from_status(StatusCode::FORBIDDEN),
            Outcome::Forbidden
        );
        assert_eq!(
            Outcome::from_status(StatusCode::NOT_FOUND),
            Outcome::NotFound
        );
        assert_eq!(
            Outcome::from_status(StatusCode::BAD_GATEWAY),
            Outcome::UpstreamUnavailable
        );
        assert_eq!(
            Outcome::from_status(StatusCode::GATEWAY_TIMEOUT),
            Outcome::UpstreamTimeout
        );
        assert_eq!(
            Outcome::from_status(StatusCode::TOO_MANY_REQUESTS),
            Outcome::ClientError
        );
        assert_eq!(
            Outcome::from_status(StatusCode::INTERNAL_SERVER_ERROR),
            Outcome::ServerError
        );
    }

    #[test]
    fn test_outcome_serializes_snake_case() {
        let json = serde_json::to_string(&Outcome::UpstreamUnavailable).unwrap();
        assert_eq!(json, "\"upstream_unavailable\"");
        assert_eq!(Outcome::UpstreamUnavailable.to_string(), "upstream_unavailable");
    }

    #[test]
    fn test_memory_sink_retains_records() {
        let sink = MemoryAuditSink::default();
        sink.record(&record(Outcome::Success)).unwrap();
        sink.record(&record(Outcome::NotFound)).unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].outcome, Outcome::NotFound);
    }

    #[test]
    fn test_sink_failure_is_counted_not_surfaced() {
        let logger = AuditLogger::new(Arc::new(FailingSink));
        logger.record(record(Outcome::Success));
        logger.record(record(Outcome::Success));
        assert_eq!(logger.failure_count(), 2);
    }

    #[test]
    fn test_tracing_sink_never_fails() {
        let logger = AuditLogger::new(Arc::new(TracingAuditSink));
        logger.record(record(Outcome::UpstreamTimeout));
        assert_eq!(logger.failure_count(), 0);
    }
}
