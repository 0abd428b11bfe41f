//! Persistent store connectivity.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     StoreConfig → manager.rs (ConnectionManager::connect)
//!     → background loop: driver.rs connect → retry every retry_delay on failure
//!     → on success: publish connection, state = Connected (state.rs)
//!     → observe driver events (error / disconnected / reconnected)
//!
//! Requests:
//!     handler → handle.rs (StoreHandle::connection / acquire)
//!     → live connection, or StoreError::Unavailable
//!
//! Shutdown:
//!     cancel loop → await loop → state = Disconnected → close connection
//! ```
//!
//! # Design Decisions
//! - Exactly one connection per process, shared through `StoreHandle`
//! - The HTTP listener never waits for the store
//! - Handlers never see a half-open connection

pub mod driver;
pub mod handle;
pub mod manager;
pub mod mongo;
pub mod state;

pub use driver::{
    DriverEvent, DriverEvents, StoreConnection, StoreDriver, StoreError, StoreOptions,
};
pub use handle::StoreHandle;
pub use manager::ConnectionManager;
pub use mongo::{MongoConnection, MongoDriver};
pub use state::ConnectionState;
