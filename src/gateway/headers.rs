//! HTTP header constants and request utilities shared across the gateway

use axum::extract::{ConnectInfo, Request};
use std::net::SocketAddr;

/// Header name for request ID used for tracing and correlation
pub const X_REQUEST_ID: &str = "x-request-id";

/// Header carrying the original caller address behind a forwarding proxy
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Authorization header prefix for bearer tokens
pub const BEARER_PREFIX: &str = "Bearer ";

/// Hop-by-hop headers that must not be forwarded to an upstream
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Well-known paths
pub mod paths {
    /// Health check endpoint path
    pub const HEALTH: &str = "/health";

    /// OAuth2 token issuance endpoint path
    pub const TOKEN: &str = "/oauth/token";

    /// Legacy fire-and-forget HL7 acceptance endpoint path
    pub const HL7_MESSAGE: &str = "/hl7/message";
}

/// Whether a path is served without a bearer token (still rate limited)
pub fn is_public(path: &str) -> bool {
    path == paths::HEALTH || path == paths::TOKEN
}

/// Caller key used for rate limiting and audit records: the first hop of
/// `x-forwarded-for` when present, otherwise the peer address.
pub fn client_ip(request: &Request) -> String {
    request
        .headers()
        .get(X_FORWARDED_FOR)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_public_paths() {
        assert!(is_public(paths::HEALTH));
        assert!(is_public(paths::TOKEN));
        assert!(!is_public(paths::HL7_MESSAGE));
        assert!(!is_public("/fhir/Patient"));
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let request = Request::builder()
            .header(X_FORWARDED_FOR, "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&request), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_falls_back_to_peer_address() {
        let mut request = Request::builder().body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo::<SocketAddr>("192.0.2.4:5000".parse().unwrap()));
        assert_eq!(client_ip(&request), "192.0.2.4");
    }

    #[test]
    fn test_client_ip_unknown_without_any_source() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&request), "unknown");
    }

    #[test]
    fn test_hop_by_hop_headers_are_lowercase() {
        for name in HOP_BY_HOP_HEADERS {
            assert_eq!(*name, name.to_lowercase());
        }
    }
}
