//! Configuration schema definitions.
//!
//! This module defines the complete runtime configuration for the server.
//! All types derive Serde traits so they can be read from a TOML file and
//! then overridden from the process environment.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Origin allowed by default outside production (the local front end).
pub const DEV_ORIGIN: &str = "http://localhost:3000";

/// Store URI used when none is configured outside production.
pub const DEV_STORE_URI: &str = "mongodb://localhost:27017/cxse";

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    /// Parse a `NODE_ENV`-style value. Unknown values fall back to development.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root configuration for the server.
///
/// Built once at startup, validated, then shared read-only.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Deployment environment (`NODE_ENV`).
    pub environment: Environment,

    /// Version reported by the health endpoint.
    pub version: String,

    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Hosting platform flags.
    pub deployment: DeploymentConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Per-client request ceiling.
    pub rate_limit: RateLimitConfig,

    /// Security headers and body limits.
    pub security: SecurityConfig,

    /// Static asset mount.
    pub static_files: StaticFilesConfig,

    /// Persistent store connection.
    pub store: StoreConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ServerConfig {
    /// Whether this process should bind an HTTP listener.
    ///
    /// Serverless production deployments are invoked by the platform instead.
    pub fn should_listen(&self) -> bool {
        !(self.environment.is_production() && self.deployment.serverless)
    }

    /// Whether internal error detail may be included in responses.
    pub fn expose_error_detail(&self) -> bool {
        !self.environment.is_production()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host to bind.
    pub host: String,

    /// Port to bind (`PORT`).
    pub port: u16,
}

impl ListenerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// Hosting platform flags.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Running on a serverless platform (`VERCEL`).
    pub serverless: bool,

    /// Public host name assigned by the platform (`VERCEL_URL`).
    pub public_url: Option<String>,
}

/// Cross-origin policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to call the API. Empty means "use the environment default".
    pub allowed_origins: Vec<String>,

    /// Send `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,

    /// Reject requests without an `Origin` header. Defaults on in production.
    pub require_origin: Option<bool>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allow_credentials: true,
            require_origin: None,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Maximum requests per client per window.
    pub max_requests: u32,

    /// Key clients by the first `X-Forwarded-For` hop instead of the peer address.
    pub trust_forwarded_for: bool,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 15 * 60,
            max_requests: 100,
            trust_forwarded_for: false,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,

    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Static asset configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// URL prefix the directory is mounted under.
    pub mount_path: String,

    /// Directory served (`UPLOADS_DIR`).
    pub directory: String,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            mount_path: "/uploads".to_string(),
            directory: "uploads".to_string(),
        }
    }
}

/// Persistent store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection string (`MONGODB_URI`).
    pub uri: Option<String>,

    /// Maximum pooled connections.
    pub max_pool_size: u32,

    /// How long an operation may wait for a usable server, in milliseconds.
    pub server_selection_timeout_ms: u64,

    /// How long an idle pooled connection is kept, in milliseconds.
    pub idle_timeout_ms: u64,

    /// Fixed delay between connect attempts, in milliseconds.
    pub retry_delay_ms: u64,
}

impl StoreConfig {
    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_millis(self.server_selection_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: None,
            max_pool_size: 10,
            server_selection_timeout_ms: 5_000,
            idle_timeout_ms: 45_000,
            retry_delay_ms: 5_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parsing() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse(" Production "), Environment::Production);
        assert_eq!(Environment::parse("test"), Environment::Test);
        assert_eq!(Environment::parse("staging"), Environment::Development);
        assert_eq!(Environment::parse(""), Environment::Development);
    }

    #[test]
    fn serverless_production_does_not_listen() {
        let mut config = ServerConfig::default();
        config.deployment.serverless = true;
        assert!(config.should_listen());

        config.environment = Environment::Production;
        assert!(!config.should_listen());
    }

    #[test]
    fn toml_sections_are_optional() {
        let config: ServerConfig = toml::from_str(
            r#"
            [rate_limit]
            max_requests = 5

            [store]
            retry_delay_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_secs, 900);
        assert_eq!(config.store.retry_delay(), Duration::from_millis(250));
        assert_eq!(config.store.max_pool_size, 10);
        assert_eq!(config.security.max_body_size, 10 * 1024 * 1024);
    }
}
