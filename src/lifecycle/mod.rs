//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config (already validated) → Connection manager connect (background)
//!     → Build router → Bind listener (skipped when serverless)
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests → Close store → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then store, then listener
//! - The listener never waits for the store to connect
//! - Ordered shutdown: stop accept, drain, close store

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, serve_until, StartupError};
