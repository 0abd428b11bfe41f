//! Per-client fixed-window rate limiting.
//!
//! # Responsibilities
//! - Count requests per client key inside a fixed window
//! - Reject the request that exceeds the ceiling with 429
//! - Sweep expired windows so idle clients do not accumulate
//!
//! # Design Decisions
//! - Fixed window, not token bucket: the counter resets when the window elapses
//! - Keyed by peer IP; `X-Forwarded-For` only when explicitly trusted
//! - Time comes from a `Clock` so windows can be tested without sleeping
//! - Rejected requests never reach routing

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::config::RateLimitConfig;
use crate::http::response::{json_error, RATE_LIMITED_MESSAGE};
use crate::observability::metrics;

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Source of monotonic time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    window_start: Instant,
}

/// Outcome of a single rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32, reset_after: Duration },
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Fixed-window counters keyed by client.
pub struct RateLimiter {
    entries: DashMap<String, WindowEntry>,
    max_requests: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            max_requests: config.max_requests,
            window: config.window(),
            clock,
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Count one request for `key` and decide whether it may proceed.
    pub fn check(&self, key: &str) -> RateDecision {
        let now = self.clock.now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert(WindowEntry {
                count: 0,
                window_start: now,
            });

        let elapsed = now.saturating_duration_since(entry.window_start);
        if elapsed >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        let reset_after = self
            .window
            .saturating_sub(now.saturating_duration_since(entry.window_start));

        if entry.count >= self.max_requests {
            return RateDecision::Limited {
                retry_after: reset_after,
            };
        }

        entry.count += 1;
        RateDecision::Allowed {
            remaining: self.max_requests - entry.count,
            reset_after,
        }
    }

    /// Drop every window that has fully elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.window_start) < self.window);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Purge expired windows once per window until cancelled.
    pub async fn run_sweeper(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.window.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return,
                _ = ticker.tick() => {
                    let removed = self.purge_expired();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.len(), "Purged expired rate-limit windows");
                    }
                }
            }
        }
    }
}

/// Middleware state.
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub trust_forwarded_for: bool,
}

impl RateLimitState {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new(config)),
            trust_forwarded_for: config.trust_forwarded_for,
        }
    }
}

fn client_key(request: &Request<Body>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get(X_FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty());
        if let Some(hop) = forwarded {
            return hop.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

fn set_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_after: Duration) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(ceil_secs(reset_after)));
}

pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&request, state.trust_forwarded_for);
    let limit = state.limiter.max_requests();

    match state.limiter.check(&key) {
        RateDecision::Allowed {
            remaining,
            reset_after,
        } => {
            let mut response = next.run(request).await;
            set_limit_headers(response.headers_mut(), limit, remaining, reset_after);
            response
        }
        RateDecision::Limited { retry_after } => {
            tracing::debug!(client = %key, retry_after_secs = ceil_secs(retry_after), "Rate limit exceeded");
            metrics::record_rate_limited();

            let mut response = json_error(StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_MESSAGE);
            let headers = response.headers_mut();
            headers.insert(
                axum::http::header::RETRY_AFTER,
                HeaderValue::from(ceil_secs(retry_after)),
            );
            set_limit_headers(headers, limit, 0, retry_after);
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Instant::now()),
            })
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    fn limiter(max_requests: u32, window_secs: u64, clock: Arc<ManualClock>) -> RateLimiter {
        let config = RateLimitConfig {
            enabled: true,
            window_secs,
            max_requests,
            trust_forwarded_for: false,
        };
        RateLimiter::with_clock(&config, clock)
    }

    #[test]
    fn request_over_the_ceiling_is_limited() {
        let clock = ManualClock::new();
        let limiter = limiter(3, 900, clock);

        for expected_remaining in [2, 1, 0] {
            match limiter.check("10.0.0.1") {
                RateDecision::Allowed { remaining, .. } => assert_eq!(remaining, expected_remaining),
                other => panic!("expected allowed, got {other:?}"),
            }
        }
        assert!(!limiter.check("10.0.0.1").is_allowed());
    }

    #[test]
    fn clients_are_counted_independently() {
        let clock = ManualClock::new();
        let limiter = limiter(1, 900, clock);

        assert!(limiter.check("10.0.0.1").is_allowed());
        assert!(!limiter.check("10.0.0.1").is_allowed());
        assert!(limiter.check("10.0.0.2").is_allowed());
    }

    #[test]
    fn window_resets_after_it_elapses() {
        let clock = ManualClock::new();
        let limiter = limiter(1, 900, Arc::clone(&clock));

        assert!(limiter.check("a").is_allowed());
        clock.advance(Duration::from_secs(600));
        match limiter.check("a") {
            RateDecision::Limited { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(300))
            }
            other => panic!("expected limited, got {other:?}"),
        }

        clock.advance(Duration::from_secs(300));
        assert!(limiter.check("a").is_allowed());
    }

    #[test]
    fn purge_drops_only_expired_windows() {
        let clock = ManualClock::new();
        let limiter = limiter(5, 60, Arc::clone(&clock));

        limiter.check("old");
        clock.advance(Duration::from_secs(30));
        limiter.check("fresh");
        clock.advance(Duration::from_secs(31));

        assert_eq!(limiter.purge_expired(), 1);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(ceil_secs(Duration::from_millis(1500)), 2);
        assert_eq!(ceil_secs(Duration::from_secs(3)), 3);
    }

    #[test]
    fn forwarded_for_is_ignored_unless_trusted() {
        let request = Request::builder()
            .header(X_FORWARDED_FOR, "203.0.113.7, 10.0.0.1")
            .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))))
            .body(Body::empty())
            .unwrap();

        assert_eq!(client_key(&request, false), "127.0.0.1");
        assert_eq!(client_key(&request, true), "203.0.113.7");
    }
}
