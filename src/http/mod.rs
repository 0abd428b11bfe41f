//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request id, trace span, metrics, timeout)
//!     → security headers
//!     → fault.rs (fault boundary, panic capture)
//!     → CORS → rate limit → body limit
//!     → static files | health | collaborators
//!     → response.rs (terminal 404, JSON error bodies)
//!     → Send to client
//! ```

pub mod fault;
pub mod request;
pub mod response;
pub mod server;

pub use fault::{AppError, FaultDetail, FaultPolicy};
pub use request::X_REQUEST_ID;
pub use response::ErrorBody;
pub use server::HttpServer;
