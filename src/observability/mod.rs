//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!
//! Consumers:
//!     → stdout (JSON in production, human-readable otherwise)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields, never interpolated strings, for anything queryable
//! - Request ID flows through every request span
//! - Metrics are cheap no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
