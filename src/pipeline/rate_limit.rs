//! Fixed-window rate limiting middleware.
//!
//! # Responsibilities
//! - Count requests per client key inside a fixed window
//! - Reject the request that exceeds the window capacity with 429
//! - Advertise the limit state via `X-RateLimit-*` response headers
//!
//! # Design Decisions
//! - Key derivation is a policy, not a hard-coded peer address
//! - Windows reset lazily on access; a background sweep drops idle keys

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::config::RateLimitConfig;
use crate::observability::metrics;
use crate::pipeline::{probe, Stage};

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Derives the limiter key for a request.
pub trait KeyPolicy: Send + Sync {
    fn key(&self, request: &Request) -> String;
}

/// Default policy: the peer address captured at accept time.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerIpPolicy;

impl KeyPolicy for PeerIpPolicy {
    fn key(&self, request: &Request) -> String {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after_secs: u64,
}

/// Fixed-window request counter keyed by client.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    window: Duration,
    max_requests: u32,
    policy: Box<dyn KeyPolicy>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, policy: Box<dyn KeyPolicy>) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window: Duration::from_millis(config.window_ms),
            max_requests: config.max_requests,
            policy,
        }
    }

    pub fn key_for(&self, request: &Request) -> String {
        self.policy.key(request)
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Admit or reject one request for `key`.
    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        // Lazy reset once the window has elapsed.
        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }

        if window.count < self.max_requests {
            window.count += 1;
            Decision {
                allowed: true,
                remaining: self.max_requests - window.count,
                retry_after_secs: 0,
            }
        } else {
            let retry_after = self
                .window
                .saturating_sub(now.duration_since(window.started));
            Decision {
                allowed: false,
                remaining: 0,
                retry_after_secs: retry_after.as_secs().max(1),
            }
        }
    }

    /// Drop windows whose interval has fully elapsed.
    pub fn evict_expired(&self) {
        self.evict_expired_at(Instant::now());
    }

    fn evict_expired_at(&self, now: Instant) {
        self.windows
            .lock()
            .expect("rate limiter mutex poisoned")
            .retain(|_, window| now.duration_since(window.started) < self.window);
    }

    /// Number of client keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .expect("rate limiter mutex poisoned")
            .len()
    }
}

/// Middleware function enforcing the admission policy.
pub async fn admit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    probe::mark(&request, Stage::RateLimit);

    let key = limiter.key_for(&request);
    let decision = limiter.check(&key);

    if decision.allowed {
        let mut response = next.run(request).await;
        stamp_limit_headers(&mut response, &limiter, decision.remaining);
        response
    } else {
        tracing::warn!(client = %key, "Rate limit exceeded");
        metrics::record_rate_limited();

        let mut response = Response::new(Body::from(
            "Too many requests, please try again later.",
        ));
        *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
        stamp_limit_headers(&mut response, &limiter, 0);
        if let Ok(value) = HeaderValue::from_str(&decision.retry_after_secs.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

fn stamp_limit_headers(response: &mut Response, limiter: &RateLimiter, remaining: u32) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&limiter.max_requests().to_string()) {
        headers.insert(HeaderName::from_static(X_RATELIMIT_LIMIT), value);
    }
    if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
        headers.insert(HeaderName::from_static(X_RATELIMIT_REMAINING), value);
    }
}
