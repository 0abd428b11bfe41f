//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::config::schema::{Environment, ServerConfig, DEV_ORIGIN, DEV_STORE_URI};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment error: {0}")]
    Env(#[from] envy::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Environment variables consumed at startup.
///
/// Field names map to upper-case variable names (`mongodb_uri` ← `MONGODB_URI`).
#[derive(Debug, Default, Deserialize)]
pub struct EnvOverrides {
    pub node_env: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub mongodb_uri: Option<String>,
    pub vercel: Option<String>,
    pub vercel_url: Option<String>,
    pub allowed_origins: Option<String>,
    pub app_version: Option<String>,
    pub uploads_dir: Option<String>,
    pub cors_require_origin: Option<bool>,
    pub metrics_address: Option<String>,
}

impl EnvOverrides {
    /// Read overrides from the current process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(envy::from_env::<Self>()?)
    }

    /// Read overrides from explicit key/value pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::from_iter::<_, Self>(vars)?)
    }
}

/// Load, resolve and validate configuration.
///
/// The optional TOML file provides the base; the process environment overrides it.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let base = match path {
        Some(path) => read_file(path)?,
        None => ServerConfig::default(),
    };
    finalize(base, EnvOverrides::from_env()?)
}

/// Parse a TOML configuration file without applying the environment.
pub fn read_file(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Apply environment overrides and environment-dependent defaults, then validate.
pub fn finalize(mut config: ServerConfig, env: EnvOverrides) -> Result<ServerConfig, ConfigError> {
    if let Some(node_env) = env.node_env.as_deref() {
        config.environment = Environment::parse(node_env);
    }
    let production = config.environment.is_production();

    if let Some(host) = env.host {
        config.listener.host = host;
    }
    if let Some(port) = env.port {
        config.listener.port = port;
    }

    if let Some(version) = env.app_version {
        config.version = version;
    }
    if config.version.is_empty() {
        config.version = env!("CARGO_PKG_VERSION").to_string();
    }

    if let Some(uri) = env.mongodb_uri.filter(|uri| !uri.trim().is_empty()) {
        config.store.uri = Some(uri);
    }
    if config.store.uri.is_none() && !production {
        config.store.uri = Some(DEV_STORE_URI.to_string());
    }

    if let Some(flag) = env.vercel.as_deref() {
        config.deployment.serverless = is_truthy(flag);
    }
    if let Some(url) = env.vercel_url.filter(|url| !url.trim().is_empty()) {
        config.deployment.public_url = Some(url);
    }

    if let Some(list) = env.allowed_origins {
        config.cors.allowed_origins = split_origins(&list);
    }
    if config.cors.allowed_origins.is_empty() {
        if production {
            if let Some(url) = config.deployment.public_url.as_deref() {
                config.cors.allowed_origins.push(normalize_origin(url));
            }
        } else {
            config.cors.allowed_origins.push(DEV_ORIGIN.to_string());
        }
    }
    config.cors.allowed_origins = config
        .cors
        .allowed_origins
        .iter()
        .map(|origin| origin.trim_end_matches('/').to_string())
        .collect();
    if let Some(require) = env.cors_require_origin {
        config.cors.require_origin = Some(require);
    }
    if config.cors.require_origin.is_none() {
        config.cors.require_origin = Some(production);
    }

    if let Some(dir) = env.uploads_dir {
        config.static_files.directory = dir;
    }
    if let Some(addr) = env.metrics_address {
        config.observability.metrics_address = addr;
        config.observability.metrics_enabled = true;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn is_truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no"
    )
}

fn split_origins(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

/// Platform URLs arrive as bare host names.
fn normalize_origin(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}
