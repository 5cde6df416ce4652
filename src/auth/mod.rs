//! Token issuance and bearer-token verification
//!
//! The issuer mints short-lived HS256-signed access tokens for the OAuth2
//! client-credentials grant; the gate verifies presented bearer tokens in
//! front of every protected route and attaches the caller's [`Principal`]
//! to the request.

pub mod claims;
pub mod gate;
pub mod issuer;

pub use claims::{Claims, Principal};
pub use gate::{auth_gate, AuthState, TokenVerifier};
pub use issuer::{AllowAnyValidator, CredentialValidator, TokenIssuer, TokenRequest};
