//! Connection lifecycle management.
//!
//! # Responsibilities
//! - Establish the single shared store connection in the background
//! - Retry failed attempts at a fixed interval, indefinitely
//! - Observe driver errors and disconnects on the live connection
//! - Close the connection on shutdown, after the retry loop has stopped
//!
//! # Design Decisions
//! - One task owns every state transition; handlers only read
//! - No exponential backoff: a down store costs one attempt per interval
//! - Re-connection of an established session is left to the driver
//! - The loop is keyed to a cancellation token so shutdown provably stops it

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::StoreConfig;
use crate::observability::metrics;
use crate::store::driver::{DriverEvent, DriverEvents, StoreDriver, StoreError, StoreOptions};
use crate::store::handle::StoreHandle;
use crate::store::state::ConnectionState;

/// Owns the store connection for the lifetime of the process.
pub struct ConnectionManager {
    driver: Arc<dyn StoreDriver>,
    options: StoreOptions,
    retry_delay: Duration,
    handle: StoreHandle,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(driver: Arc<dyn StoreDriver>, options: StoreOptions, retry_delay: Duration) -> Self {
        let handle = StoreHandle::disconnected(options.server_selection_timeout);
        Self {
            driver,
            options,
            retry_delay,
            handle,
            shutdown: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    pub fn from_config(driver: Arc<dyn StoreDriver>, config: &StoreConfig) -> Result<Self, StoreError> {
        let options = StoreOptions::from_config(config)?;
        Ok(Self::new(driver, options, config.retry_delay()))
    }

    /// Handle to the managed connection. Valid before, during and after connect.
    pub fn handle(&self) -> StoreHandle {
        self.handle.clone()
    }

    /// Start connecting in the background and return the shared handle.
    ///
    /// Calling this again never starts a second connect loop.
    pub fn connect(&self) -> StoreHandle {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_none() && !self.shutdown.is_cancelled() {
            let connect_loop = ConnectLoop {
                driver: Arc::clone(&self.driver),
                options: self.options.clone(),
                retry_delay: self.retry_delay,
                handle: self.handle.clone(),
                shutdown: self.shutdown.clone(),
            };
            tracing::info!(
                max_pool_size = self.options.max_pool_size,
                server_selection_timeout_ms = self.options.server_selection_timeout.as_millis() as u64,
                idle_timeout_ms = self.options.idle_timeout.as_millis() as u64,
                "Connecting to store"
            );
            *task = Some(tokio::spawn(connect_loop.run()));
        }
        self.handle.clone()
    }

    /// Stop retrying and close the connection, waiting for the close to finish.
    pub async fn close(&self) -> Result<(), StoreError> {
        self.shutdown.cancel();

        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Store connect task ended abnormally");
            }
        }

        transition(&self.handle, ConnectionState::Disconnected);

        match self.handle.retract() {
            Some(connection) => {
                connection.close().await?;
                tracing::info!("Store connection closed through app termination");
            }
            None => tracing::debug!("No store connection to close"),
        }
        Ok(())
    }
}

struct ConnectLoop {
    driver: Arc<dyn StoreDriver>,
    options: StoreOptions,
    retry_delay: Duration,
    handle: StoreHandle,
    shutdown: CancellationToken,
}

impl ConnectLoop {
    async fn run(self) {
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            transition(&self.handle, ConnectionState::Connecting);

            let (events, mut observed) = DriverEvents::channel();
            let outcome = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return,
                outcome = self.driver.connect(&self.options, events) => outcome,
            };

            match outcome {
                Ok(connection) => {
                    metrics::record_store_attempt("success");
                    self.handle.publish(connection);
                    transition(&self.handle, ConnectionState::Connected);
                    tracing::info!(attempt, "Store connected successfully");

                    discard_pending(&mut observed);

                    self.observe(observed).await;
                    return;
                }
                Err(e) => {
                    metrics::record_store_attempt("failure");
                    transition(&self.handle, ConnectionState::Errored);
                    tracing::error!(
                        attempt,
                        error = %e,
                        retry_in_ms = self.retry_delay.as_millis() as u64,
                        "Store connection failed, retrying"
                    );

                    tokio::select! {
                        biased;
                        _ = self.shutdown.cancelled() => return,
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }
    }

    /// Passive observers on an established connection.
    async fn observe(&self, mut events: mpsc::UnboundedReceiver<DriverEvent>) {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return,
                event = events.recv() => event,
            };

            match event {
                Some(DriverEvent::Error(detail)) => {
                    tracing::error!(error = %detail, "Store connection error");
                }
                Some(DriverEvent::Disconnected) => {
                    transition(&self.handle, ConnectionState::Disconnected);
                    tracing::warn!("Store disconnected");
                }
                Some(DriverEvent::Reconnected) => {
                    transition(&self.handle, ConnectionState::Connected);
                    tracing::info!("Store reconnected");
                }
                None => return,
            }
        }
    }
}

/// Events raised while the attempt was in flight predate the verified connection.
fn discard_pending(events: &mut mpsc::UnboundedReceiver<DriverEvent>) {
    while let Ok(event) = events.try_recv() {
        if let DriverEvent::Error(detail) = event {
            tracing::debug!(error = %detail, "Store error before connect");
        }
    }
}

fn transition(handle: &StoreHandle, next: ConnectionState) {
    if handle.set_state(next) {
        metrics::record_store_state(next);
        tracing::debug!(state = %next, "Store connection state changed");
    }
}
