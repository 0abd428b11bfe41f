//! Store driver abstraction.
//!
//! The connection manager only talks to these traits; `MongoDriver` is the
//! production implementation and tests substitute scripted drivers.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::StoreConfig;

/// Errors surfaced by the store layer.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No usable connection right now. Handlers map this to 503.
    #[error("store unavailable")]
    Unavailable,

    /// A connect attempt failed.
    #[error("store connection failed: {0}")]
    Connect(String),

    /// An established connection failed an operation.
    #[error("store operation failed: {0}")]
    Operation(String),

    /// The connection string could not be used.
    #[error("invalid store configuration: {0}")]
    Config(String),
}

/// Options handed to the driver for every connect attempt.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub uri: String,
    pub app_name: String,
    pub max_pool_size: u32,
    pub server_selection_timeout: Duration,
    pub idle_timeout: Duration,
}

impl StoreOptions {
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let uri = config
            .uri
            .clone()
            .ok_or_else(|| StoreError::Config("no connection string configured".into()))?;
        Ok(Self {
            uri,
            app_name: env!("CARGO_PKG_NAME").to_string(),
            max_pool_size: config.max_pool_size,
            server_selection_timeout: config.server_selection_timeout(),
            idle_timeout: config.idle_timeout(),
        })
    }
}

/// Asynchronous notifications from an established connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// The driver hit an error; it keeps managing the session itself.
    Error(String),
    /// The driver lost its connection to the store.
    Disconnected,
    /// The driver re-established its connection on its own.
    Reconnected,
}

/// Sending side of a connection's event stream.
#[derive(Debug, Clone)]
pub struct DriverEvents {
    tx: mpsc::UnboundedSender<DriverEvent>,
}

impl DriverEvents {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DriverEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit an event. Dropped silently once nobody observes the connection.
    pub fn emit(&self, event: DriverEvent) {
        let _ = self.tx.send(event);
    }
}

/// Factory for store connections.
#[async_trait]
pub trait StoreDriver: Send + Sync + 'static {
    /// Establish a connection and verify it is usable.
    ///
    /// `events` stays with the connection for its whole lifetime.
    async fn connect(
        &self,
        options: &StoreOptions,
        events: DriverEvents,
    ) -> Result<Arc<dyn StoreConnection>, StoreError>;
}

/// A live, shareable link to the store.
#[async_trait]
pub trait StoreConnection: Send + Sync + fmt::Debug + 'static {
    /// Round-trip to the store.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Close the connection, waiting for in-flight work to finish.
    async fn close(&self) -> Result<(), StoreError>;

    fn as_any(&self) -> &dyn Any;
}

impl dyn StoreConnection {
    /// Access the concrete connection type (e.g. `MongoConnection`).
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}
