//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (security headers on every response)
//!     → cors.rs (origin allow-list, preflight)
//!     → rate_limit.rs (per-client fixed window)
//!     → limits.rs (body size ceiling, buffering)
//!     → Pass to static files / routing
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Fail closed: reject on any security check failure
//! - Rejections short-circuit; nothing behind them runs
//! - No trust in client input

pub mod cors;
pub mod headers;
pub mod limits;
pub mod rate_limit;

pub use cors::{cors_middleware, CorsPolicy};
pub use headers::security_headers_middleware;
pub use limits::body_limit_middleware;
pub use rate_limit::{rate_limit_middleware, Clock, RateDecision, RateLimitState, RateLimiter, SystemClock};
