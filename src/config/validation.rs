//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Enforce production-only requirements (store URI, explicit origins)
//! - Validate value ranges (ceilings > 0, well-formed mount path)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use mongodb::options::ConnectionString;
use thiserror::Error;
use url::Url;

use crate::config::schema::ServerConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("store.uri (MONGODB_URI) is required in production")]
    MissingStoreUri,

    #[error("store.uri is not a valid mongodb:// or mongodb+srv:// connection string")]
    InvalidStoreUri,

    #[error("production requires an explicit CORS allow-list (ALLOWED_ORIGINS or VERCEL_URL)")]
    NoAllowedOrigins,

    #[error("wildcard CORS origin is not permitted in production")]
    WildcardOrigin,

    #[error("invalid CORS origin '{0}': expected scheme://host[:port]")]
    InvalidOrigin(String),

    #[error("rate_limit.max_requests and rate_limit.window_secs must be greater than 0")]
    InvalidRateLimit,

    #[error("security.max_body_size must be greater than 0")]
    InvalidBodyLimit,

    #[error("static_files.mount_path '{0}' must start with '/' and name a sub-path")]
    InvalidMountPath(String),

    #[error("store.max_pool_size must be greater than 0")]
    InvalidPoolSize,

    #[error("store.retry_delay_ms must be greater than 0")]
    InvalidRetryDelay,

    #[error("timeouts.request_secs must be greater than 0")]
    InvalidTimeout,
}

/// Validate a resolved configuration, collecting every error.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let production = config.environment.is_production();

    match config.store.uri.as_deref() {
        None if production => errors.push(ValidationError::MissingStoreUri),
        None => {}
        Some(uri) => {
            if ConnectionString::parse(uri).is_err() {
                errors.push(ValidationError::InvalidStoreUri);
            }
        }
    }

    let origins = &config.cors.allowed_origins;
    if production && origins.is_empty() {
        errors.push(ValidationError::NoAllowedOrigins);
    }
    for origin in origins {
        if origin == "*" {
            if production {
                errors.push(ValidationError::WildcardOrigin);
            }
            continue;
        }
        if !is_valid_origin(origin) {
            errors.push(ValidationError::InvalidOrigin(origin.clone()));
        }
    }

    if config.rate_limit.enabled
        && (config.rate_limit.max_requests == 0 || config.rate_limit.window_secs == 0)
    {
        errors.push(ValidationError::InvalidRateLimit);
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::InvalidBodyLimit);
    }

    let mount = &config.static_files.mount_path;
    if !mount.starts_with('/') || mount == "/" || mount.ends_with('/') {
        errors.push(ValidationError::InvalidMountPath(mount.clone()));
    }

    if config.store.max_pool_size == 0 {
        errors.push(ValidationError::InvalidPoolSize);
    }
    if config.store.retry_delay_ms == 0 {
        errors.push(ValidationError::InvalidRetryDelay);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::InvalidTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// An origin is `scheme://host[:port]` with no path, query or fragment.
fn is_valid_origin(origin: &str) -> bool {
    match Url::parse(origin) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some()
                && url.path() == "/"
                && !origin.ends_with('/')
                && url.query().is_none()
                && url.fragment().is_none()
        }
        Err(_) => false,
    }
}
