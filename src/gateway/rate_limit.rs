//! Fixed-window request throttling per caller key
//!
//! The counter store is an injectable seam: single-instance deployments use
//! the in-process [`MemoryCounterStore`]; multi-instance deployments can
//! supply a shared external store without changing the limiter's contract.

use crate::gateway::headers::client_ip;
use crate::gateway::types::GatewayError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Limit and window applied to every caller key
#[derive(Clone, Copy, Debug)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
        }
    }
}

/// Admission decision for one request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Throttled,
}

/// Per-key counter storage behind the fixed-window algorithm.
///
/// `admit` must serialize the read-modify-write for a given key so
/// concurrent bursts cannot undercount.
pub trait CounterStore: Send + Sync {
    fn admit(&self, key: &str, now: Instant, policy: RateLimitPolicy) -> Admission;
}

#[derive(Clone, Copy, Debug)]
struct WindowState {
    count: u32,
    window_start: Instant,
}

/// Admissions between sweeps of expired window entries
const SWEEP_INTERVAL: u64 = 1024;

/// In-process counter table guarded by a mutex.
///
/// The critical section is the counter mutation only; it is never held
/// across an await point. The key space is caller-controlled (forged
/// `x-forwarded-for` values land here), so every `SWEEP_INTERVAL`
/// admissions the table drops entries whose window has elapsed to keep
/// it bounded by recent traffic.
#[derive(Default)]
pub struct MemoryCounterStore {
    windows: Mutex<HashMap<String, WindowState>>,
    admissions: AtomicU64,
}

impl MemoryCounterStore {
    /// Number of caller keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().len()
    }
}

impl CounterStore for MemoryCounterStore {
    fn admit(&self, key: &str, now: Instant, policy: RateLimitPolicy) -> Admission {
        let mut windows = self.windows.lock();

        let admissions = self.admissions.fetch_add(1, Ordering::Relaxed);
        if admissions % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            windows.retain(|_, state| now.duration_since(state.window_start) < policy.window);
        }

        let state = windows.entry(key.to_string()).or_insert(WindowState {
            count: 0,
            window_start: now,
        });

        if now.duration_since(state.window_start) >= policy.window {
            state.count = 0;
            state.window_start = now;
        }

        state.count += 1;
        if state.count > policy.max_requests {
            Admission::Throttled
        } else {
            Admission::Allowed
        }
    }
}

/// Shared state for the rate limiting middleware
#[derive(Clone)]
pub struct RateLimitState {
    pub store: Arc<dyn CounterStore>,
    pub policy: RateLimitPolicy,
}

/// Rate limiting middleware - admits or throttles before routing
///
/// Runs for every route including public ones. Throttled requests are
/// answered directly and never reach routing or auditing.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_ip(&request);
    match state.store.admit(&key, Instant::now(), state.policy) {
        Admission::Allowed => next.run(request).await,
        Admission::Throttled => {
            warn!(key = %key, path = %request.uri().path(), "request throttled");
            GatewayError::RateLimited.into_response()
        }
    }
}
