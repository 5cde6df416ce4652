//! Portico - an authenticating edge gateway for healthcare integration services
//!
//! Portico sits in front of a set of backend HTTP services and provides a
//! single hardened entry point: OAuth2 client-credentials token issuance,
//! bearer-token verification, per-caller request throttling, prefix-based
//! routing to upstreams, transparent proxying, and an audit trail for every
//! processed request.

pub mod application;
pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;

pub use application::Application;
pub use error::{Error, Result};
