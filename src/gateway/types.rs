//! Type definitions for the gateway module

use nutype::nutype;
use std::time::Duration;
use thiserror::Error;

/// URL prefix a route entry matches against (always starts with `/`)
#[nutype(
    derive(Clone, Debug, Display, Hash, PartialEq, Eq, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |s: &str| s.starts_with('/') && s.len() > 1),
)]
pub struct RoutePrefix(String);

/// Base URL of a proxied upstream service
#[nutype(
    derive(Clone, Debug, Display, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |s: &str| s.starts_with("http://") || s.starts_with("https://")),
)]
pub struct UpstreamUrl(String);

/// Marker placed on responses whose body must be replaced by the generic
/// internal-error shape before leaving the gateway. Upstream 500s relayed
/// by the dispatcher never carry it, which keeps proxying transparent.
#[derive(Clone, Copy, Debug)]
pub struct InternalErrorMarker;

/// Errors that can occur while processing a request
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("invalid request: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    #[error("client credentials rejected")]
    InvalidClient,

    #[error("access token required")]
    MissingToken,

    #[error("invalid or expired access token")]
    InvalidToken,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("no route matches the requested path")]
    NotFound,

    #[error("upstream {upstream} unavailable")]
    UpstreamUnavailable { upstream: String },

    #[error("upstream request timed out after {0:?}")]
    UpstreamTimeout(Duration),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_prefix_requires_leading_slash() {
        assert!(RoutePrefix::try_new("/fhir".to_string()).is_ok());
        assert!(RoutePrefix::try_new("fhir".to_string()).is_err());
        assert!(RoutePrefix::try_new("/".to_string()).is_err());
    }

    #[test]
    fn test_upstream_url_requires_http_scheme() {
        assert!(UpstreamUrl::try_new("http://localhost:8081".to_string()).is_ok());
        assert!(UpstreamUrl::try_new("https://fhir.internal".to_string()).is_ok());
        assert!(UpstreamUrl::try_new("ftp://fhir.internal".to_string()).is_err());
        assert!(UpstreamUrl::try_new("localhost:8081".to_string()).is_err());
    }
}
