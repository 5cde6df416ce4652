//! Access token issuance for the OAuth2 client-credentials grant

use crate::auth::claims::{default_scope, Claims};
use crate::gateway::{GatewayError, GatewayResult};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Only supported grant type; all others are rejected
pub const GRANT_CLIENT_CREDENTIALS: &str = "client_credentials";

/// Pluggable credential check applied before a token is issued.
///
/// The gateway core ships with [`AllowAnyValidator`], which accepts any
/// non-empty pair. Deployments that require real authentication supply a
/// validator backed by a credential store; the issuer's contract does not
/// change.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(&self, client_id: &str, client_secret: &str) -> bool;
}

/// Accepts every non-empty credential pair (field presence is checked by the
/// issuer before the validator runs).
pub struct AllowAnyValidator;

#[async_trait]
impl CredentialValidator for AllowAnyValidator {
    async fn validate(&self, _client_id: &str, _client_secret: &str) -> bool {
        true
    }
}

/// Body of a `POST /oauth/token` request
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub grant_type: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

/// Successful token issuance response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub scope: String,
}

/// Mints short-lived signed access tokens for presented client credentials
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    issuer: String,
    ttl_secs: i64,
    scope: Vec<String>,
    validator: Arc<dyn CredentialValidator>,
}

impl TokenIssuer {
    pub fn new(
        secret: &str,
        issuer: impl Into<String>,
        ttl_secs: i64,
        validator: Arc<dyn CredentialValidator>,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            ttl_secs,
            scope: default_scope(),
            validator,
        }
    }

    /// Issue a token for the client-credentials grant.
    ///
    /// Fails with `unsupported_grant_type` for any other grant, and with a
    /// field-level validation error when either credential field is empty.
    pub async fn issue(&self, request: &TokenRequest) -> GatewayResult<TokenGrant> {
        if request.grant_type != GRANT_CLIENT_CREDENTIALS {
            return Err(GatewayError::UnsupportedGrantType(
                request.grant_type.clone(),
            ));
        }

        for (field, value) in [
            ("client_id", &request.client_id),
            ("client_secret", &request.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(GatewayError::Validation {
                    field: field.to_string(),
                    message: format!("{field} is required"),
                });
            }
        }

        if !self
            .validator
            .validate(&request.client_id, &request.client_secret)
            .await
        {
            return Err(GatewayError::InvalidClient);
        }

        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: request.client_id.clone(),
            scope: self.scope.clone(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now + self.ttl_secs,
        };

        let access_token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| GatewayError::Internal(format!("token signing failed: {e}")))?;

        info!(client_id = %request.client_id, expires_in = self.ttl_secs, "issued access token");

        Ok(TokenGrant {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.ttl_secs,
            scope: self.scope.join(" "),
        })
    }
}
