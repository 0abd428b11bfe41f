//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     Collaborator[] (auth, scenarios, sessions)
//!     → router.rs (validate prefixes, reject collisions)
//!     → each collaborator builds its Router with the StoreHandle
//!     → nested under its prefix, frozen into the app Router
//!
//! Incoming Request:
//!     → at most one mounted prefix matches (overlaps are rejected)
//!     → unmatched requests fall through to the terminal 404
//! ```
//!
//! # Design Decisions
//! - Mounts are compiled at startup, immutable at runtime
//! - Collaborators get the store handle injected; there is no global
//! - Built-in routes (health, static files) are reserved and cannot be shadowed

pub mod collaborator;
pub mod router;

pub use collaborator::{Collaborator, AUTH_PREFIX, SCENARIOS_PREFIX, SESSIONS_PREFIX};
pub use router::{Dispatch, RoutingError};
