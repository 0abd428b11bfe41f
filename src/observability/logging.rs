//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber
//! - Pick the output format for the environment
//!
//! # Design Decisions
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` wins over the configured default filter

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Environment, ObservabilityConfig};

/// Filter used when neither `RUST_LOG` nor the config names one.
pub fn default_filter(config: &ObservabilityConfig) -> String {
    format!(
        "cxse_server={level},tower_http={level}",
        level = config.log_level
    )
}

/// Install the global subscriber. Safe to call more than once.
pub fn init(config: &ObservabilityConfig, environment: Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config)));

    let result = if environment.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }
}
