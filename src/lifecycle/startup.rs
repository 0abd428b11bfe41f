//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the store connection in the background
//! - Build the HTTP server and bind its listener
//! - Run until a termination signal, then shut down in order
//!
//! # Design Decisions
//! - Fail fast: bind and mount errors are fatal
//! - Store connectivity is never fatal; it is retried in the background
//! - `serve_until` returns only after the store connection is closed

use std::future::Future;
use std::io;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::routing::{Dispatch, RoutingError};
use crate::store::{ConnectionManager, StoreDriver, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("HTTP server failed: {0}")]
    Serve(#[source] io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Routing(#[from] RoutingError),
}

/// Run the server until SIGINT or SIGTERM.
pub async fn run(
    config: ServerConfig,
    driver: Arc<dyn StoreDriver>,
    dispatch: Dispatch,
) -> Result<(), StartupError> {
    let listener = if config.should_listen() {
        let address = config.listener.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| StartupError::Bind { address, source })?;
        Some(listener)
    } else {
        None
    };

    serve_until(config, driver, dispatch, listener, signals::wait_for_signal()).await
}

/// Run until `signal` resolves.
///
/// Without a listener the process only holds the store connection, as in a
/// serverless deployment where the platform dispatches requests.
pub async fn serve_until<F>(
    config: ServerConfig,
    driver: Arc<dyn StoreDriver>,
    dispatch: Dispatch,
    listener: Option<TcpListener>,
    signal: F,
) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let config = Arc::new(config);
    tracing::info!(
        version = %config.version,
        environment = %config.environment,
        "cxse-server starting"
    );

    let manager = ConnectionManager::from_config(driver, &config.store)?;
    let store = manager.connect();

    let server = match HttpServer::new(Arc::clone(&config), store, dispatch) {
        Ok(server) => server,
        Err(e) => {
            close_store(&manager).await;
            return Err(e.into());
        }
    };

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signal.await;
        trigger.trigger();
    });

    let served = match listener {
        Some(listener) => server
            .run(listener, shutdown.subscribe())
            .await
            .map_err(StartupError::Serve),
        None => {
            tracing::info!("Serverless deployment, no listener bound");
            shutdown.wait().await;
            Ok(())
        }
    };

    shutdown.trigger();
    close_store(&manager).await;

    tracing::info!("Shutdown complete");
    served
}

async fn close_store(manager: &ConnectionManager) {
    if let Err(e) = manager.close().await {
        tracing::error!(error = %e, "Failed to close store connection");
    }
}
