use serde::{Deserialize, Serialize};

/// Scopes granted to every client issued a token.
///
/// Scope is carried in the token and surfaced on the [`Principal`] but is
/// not currently enforced per route; routes gate on token validity alone.
pub const DEFAULT_SCOPE: &[&str] = &["system/*.read", "system/*.write"];

/// Signed claim set carried by an access token
///
/// Validity is purely a function of the signature and `exp`; there is no
/// revocation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Client identifier the token was issued to
    pub sub: String,
    pub scope: Vec<String>,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Verified caller identity attached to authenticated requests
#[derive(Debug, Clone)]
pub struct Principal {
    pub client_id: String,
    pub scope: Vec<String>,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            client_id: claims.sub,
            scope: claims.scope,
        }
    }
}

pub fn default_scope() -> Vec<String> {
    DEFAULT_SCOPE.iter().map(|s| (*s).to_string()).collect()
}
