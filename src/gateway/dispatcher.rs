//! Proxy dispatcher: forwards authorized requests to their mapped upstream
//!
//! Transparent proxy semantics: the upstream's status, headers, and body are
//! relayed verbatim, with request and response bodies streamed end to end.
//! Stateless per request; no caching and no retries (a retry here could
//! duplicate non-idempotent writes against a backend).

use crate::gateway::headers::HOP_BY_HOP_HEADERS;
use crate::gateway::routes::RouteEntry;
use crate::gateway::types::{GatewayError, GatewayResult};
use axum::body::Body;
use http::header::{AUTHORIZATION, HOST};
use http_body::Body as HttpBody;
use hyper::{Request, Response};
use std::time::Duration;
use tracing::{debug, error};

/// Forwards requests to upstreams with a bounded timeout
#[derive(Clone)]
pub struct Dispatcher {
    client: hyper_util::client::legacy::Client<
        hyper_util::client::legacy::connect::HttpConnector,
        Body,
    >,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(timeout: Duration) -> Self {
        let client =
            hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
                .build_http();

        Self { client, timeout }
    }

    /// Forward a request to the upstream named by the matched route entry.
    ///
    /// Connection failures map to 502 and elapsed timeouts to 504; in both
    /// cases the detailed cause is logged here and never surfaced to the
    /// client. Dropping the returned future (client disconnect) aborts the
    /// in-flight upstream call.
    pub async fn dispatch(
        &self,
        request: Request<Body>,
        route: &RouteEntry,
    ) -> GatewayResult<Response<Body>> {
        let (mut parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let upstream_uri = format!(
            "{}{}",
            route.upstream.as_ref().trim_end_matches('/'),
            path_and_query
        );
        parts.uri = upstream_uri
            .parse()
            .map_err(|_| GatewayError::Internal(format!("unparseable upstream URI for route {}", route.prefix)))?;

        // Strip hop-by-hop headers; the client derives Host from the
        // upstream URI.
        for name in HOP_BY_HOP_HEADERS {
            parts.headers.remove(*name);
        }
        parts.headers.remove(HOST);

        if let Some(credential) = &route.upstream_credential {
            let value = credential
                .authorization_value()
                .parse()
                .map_err(|_| GatewayError::Internal("invalid upstream credential".to_string()))?;
            parts.headers.insert(AUTHORIZATION, value);
        }

        debug!(
            method = %parts.method,
            uri = %parts.uri,
            body_size_hint = body.size_hint().upper().unwrap_or(0),
            "forwarding request to upstream"
        );

        let outgoing = Request::from_parts(parts, body);
        let response_future = self.client.request(outgoing);

        let response = tokio::time::timeout(self.timeout, response_future)
            .await
            .map_err(|_| {
                error!(route = %route.prefix, timeout = ?self.timeout, "upstream request timed out");
                GatewayError::UpstreamTimeout(self.timeout)
            })?
            .map_err(|e| {
                error!(route = %route.prefix, upstream = %route.upstream, error = %e, "upstream request failed");
                GatewayError::UpstreamUnavailable {
                    upstream: route.upstream.as_ref().to_string(),
                }
            })?;

        Ok(response.map(Body::new))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::routes::BasicCredential;
    use crate::gateway::types::{RoutePrefix, UpstreamUrl};

    fn route(upstream: &str, credential: Option<BasicCredential>) -> RouteEntry {
        RouteEntry {
            prefix: RoutePrefix::try_new("/fhir".to_string()).unwrap(),
            upstream: UpstreamUrl::try_new(upstream.to_string()).unwrap(),
            requires_auth: true,
            upstream_credential: credential,
        }
    }

    #[tokio::test]
    async fn test_dispatcher_creation() {
        let dispatcher = Dispatcher::new(Duration::from_secs(5));
        assert_eq!(dispatcher.timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_maps_to_unavailable() {
        let dispatcher = Dispatcher::new(Duration::from_secs(2));
        // Port 1 is never listening
        let route = route("http://127.0.0.1:1", None);

        let request = Request::builder()
            .method("GET")
            .uri("/fhir/Patient")
            .body(Body::empty())
            .unwrap();

        let result = dispatcher.dispatch(request, &route).await;
        assert!(matches!(
            result,
            Err(GatewayError::UpstreamUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_credential_injection_uses_configured_pair() {
        // Exercised fully in the integration tests; here we only check the
        // header value shape the dispatcher injects.
        let credential = BasicCredential::new("svc", "secret");
        let value = credential.authorization_value();
        assert!(value.starts_with("Basic "));
        assert!(value.parse::<http::HeaderValue>().is_ok());
    }
}
