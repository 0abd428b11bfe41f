//! CxSE API server library.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (request id, trace, metrics, timeout)
//!                       → security::headers
//!                       → http::fault (fault boundary)
//!                       → security::cors → security::rate_limit → security::limits
//!                       → /uploads (static) | /api/health | routing (collaborators)
//!                       → terminal 404
//!
//!     Background
//!     ──────────────▶ store::manager (connect, retry, observe, close)
//!                       → store::handle (shared with health and collaborators)
//!
//!     Cross-cutting: config, observability, lifecycle
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;
pub mod store;

// Request guards
pub mod security;

// Cross-cutting concerns
pub mod health;
pub mod lifecycle;
pub mod observability;

pub use config::ServerConfig;
pub use http::{AppError, HttpServer};
pub use lifecycle::Shutdown;
pub use routing::{Collaborator, Dispatch};
pub use store::{ConnectionManager, StoreHandle};
