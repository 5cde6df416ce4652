//! Bearer-token verification in front of every protected route

use crate::auth::claims::{Claims, Principal};
use crate::gateway::headers::{is_public, BEARER_PREFIX};
use crate::gateway::routes::RouteTable;
use crate::gateway::{GatewayError, GatewayResult};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{errors::ErrorKind, decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use tracing::warn;

/// Verifies token signature and expiry and extracts the caller identity
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str, issuer: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        // Expiry is a hard boundary: a token is valid at exp - 1s and
        // rejected at exp + 1s.
        validation.leeway = 0;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a bearer token and produce the caller's [`Principal`].
    ///
    /// Expired tokens and bad signatures both map to `InvalidToken` but are
    /// distinguished in the logs.
    pub fn verify(&self, token: &str) -> GatewayResult<Principal> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(Principal::from(data.claims)),
            Err(err) => {
                match err.kind() {
                    ErrorKind::ExpiredSignature => warn!("rejected expired access token"),
                    ErrorKind::InvalidSignature => {
                        warn!("rejected access token with invalid signature")
                    }
                    kind => warn!(?kind, "rejected malformed access token"),
                }
                Err(GatewayError::InvalidToken)
            }
        }
    }
}

/// Shared state for the authentication middleware
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<TokenVerifier>,
    pub routes: Arc<RouteTable>,
}

/// Authentication middleware - verifies bearer tokens on protected routes
///
/// Public paths pass through untouched. Paths that match no route pass
/// through as well so the fallback can answer 404 without demanding a
/// token. On success the [`Principal`] is attached to the request (for
/// handlers) and to the response (for the audit layer).
pub async fn auth_gate(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    let protected = !is_public(path)
        && state
            .routes
            .resolve(path)
            .map(|route| route.requires_auth)
            .unwrap_or(false);
    if !protected {
        return next.run(request).await;
    }

    let token = match bearer_token(&request) {
        Some(token) => token,
        None => {
            warn!(path = %request.uri().path(), "request to protected route without bearer token");
            return GatewayError::MissingToken.into_response();
        }
    };

    match state.verifier.verify(&token) {
        Ok(principal) => {
            request.extensions_mut().insert(principal.clone());
            let mut response = next.run(request).await;
            response.extensions_mut().insert(principal);
            response
        }
        Err(err) => err.into_response(),
    }
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| auth.strip_prefix(BEARER_PREFIX))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}
