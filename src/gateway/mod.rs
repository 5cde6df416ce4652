//! Gateway module: the request pipeline around the proxy dispatcher
//!
//! Inbound requests flow through an explicit ordered stack:
//! request id -> security headers -> CORS -> logging -> error handling ->
//! rate limit -> audit -> auth gate -> route handlers / proxy fallback.

pub mod dispatcher;
pub mod error_response;
pub mod handlers;
pub mod headers;
pub mod middleware;
pub mod middleware_stack;
pub mod rate_limit;
pub mod routes;
pub mod service;
pub mod types;


pub use service::GatewayService;
pub use types::{GatewayError, GatewayResult};
