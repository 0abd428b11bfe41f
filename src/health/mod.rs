//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! Liveness (GET /api/health):
//!     → report.rs (environment, version, store state, monotonic timestamp)
//!     → always 200; the store is reported, never probed
//!
//! Readiness (GET /api/health/ready):
//!     → same report
//!     → 200 when the store is Connected, 503 otherwise
//! ```
//!
//! # Design Decisions
//! - Liveness never touches the store, so it answers while the store is down
//! - Timestamps strictly increase across calls, even if the wall clock steps back
//! - Unsupported methods on these paths fall through to the 404 handler

pub mod report;
pub mod routes;

pub use report::{HealthReport, MonotonicTimestamp};
pub use routes::{routes, HealthState, HEALTH_PATH, READY_PATH};
