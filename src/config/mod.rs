//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → process environment (envy) overrides
//!     → environment-dependent defaults (origins, store URI)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no hot reload
//! - All fields have defaults to allow minimal configs
//! - Environment branching is resolved here, once, into named fields
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, EnvOverrides};
pub use schema::{
    CorsConfig, Environment, ListenerConfig, ObservabilityConfig, RateLimitConfig,
    SecurityConfig, ServerConfig, StaticFilesConfig, StoreConfig,
};
pub use validation::ValidationError;
