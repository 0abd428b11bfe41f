//! MongoDB implementation of the store driver.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::event::sdam::SdamEvent;
use mongodb::event::EventHandler;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};

use crate::store::driver::{
    DriverEvent, DriverEvents, StoreConnection, StoreDriver, StoreError, StoreOptions,
};

/// Database used when the connection string does not name one.
pub const DEFAULT_DATABASE: &str = "cxse";

/// Connects through the official `mongodb` driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoDriver;

impl MongoDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StoreDriver for MongoDriver {
    async fn connect(
        &self,
        options: &StoreOptions,
        events: DriverEvents,
    ) -> Result<Arc<dyn StoreConnection>, StoreError> {
        let mut client_options = ClientOptions::parse(options.uri.as_str())
            .await
            .map_err(|e| StoreError::Config(e.to_string()))?;

        client_options.app_name = Some(options.app_name.clone());
        client_options.max_pool_size = Some(options.max_pool_size);
        client_options.server_selection_timeout = Some(options.server_selection_timeout);
        client_options.max_idle_time = Some(options.idle_timeout);
        client_options.sdam_event_handler = Some(heartbeat_observer(events));

        let database_name = client_options
            .default_database
            .clone()
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let client = Client::with_options(client_options)
            .map_err(|e| StoreError::Connect(e.to_string()))?;

        // The driver connects lazily; force server selection now.
        if let Err(e) = client.database("admin").run_command(doc! { "ping": 1 }).await {
            client.shutdown().await;
            return Err(StoreError::Connect(e.to_string()));
        }

        let database = client.database(&database_name);
        tracing::debug!(database = %database_name, "MongoDB client ready");

        Ok(Arc::new(MongoConnection { client, database }))
    }
}

/// Maps driver heartbeats onto connection events.
fn heartbeat_observer(events: DriverEvents) -> EventHandler<SdamEvent> {
    let topology = Mutex::new(TopologyHealth::default());
    EventHandler::callback(move |event: SdamEvent| {
        let edge = match event {
            SdamEvent::ServerHeartbeatFailed(failed) => {
                let address = failed.server_address.to_string();
                events.emit(DriverEvent::Error(format!("{address}: {}", failed.failure)));
                lock(&topology).record(&address, false)
            }
            SdamEvent::ServerHeartbeatSucceeded(succeeded) => {
                lock(&topology).record(&succeeded.server_address.to_string(), true)
            }
            SdamEvent::ServerClosed(closed) => lock(&topology).forget(&closed.address.to_string()),
            _ => None,
        };
        if let Some(edge) = edge {
            events.emit(edge);
        }
    })
}

fn lock(topology: &Mutex<TopologyHealth>) -> MutexGuard<'_, TopologyHealth> {
    topology.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reachability of the deployment as a whole, from per-server heartbeats.
///
/// The deployment is reachable while any server's latest heartbeat succeeded.
/// Only edges between reachable and unreachable produce events, and nothing is
/// reported until the first server has been heard from.
#[derive(Debug, Default)]
struct TopologyHealth {
    servers: HashMap<String, bool>,
    reachable: Option<bool>,
}

impl TopologyHealth {
    fn record(&mut self, address: &str, healthy: bool) -> Option<DriverEvent> {
        self.servers.insert(address.to_string(), healthy);
        self.update()
    }

    fn forget(&mut self, address: &str) -> Option<DriverEvent> {
        self.servers.remove(address)?;
        self.update()
    }

    fn update(&mut self) -> Option<DriverEvent> {
        let reachable = self.servers.values().any(|healthy| *healthy);
        match self.reachable.replace(reachable) {
            Some(true) if !reachable => Some(DriverEvent::Disconnected),
            Some(false) if reachable => Some(DriverEvent::Reconnected),
            _ => None,
        }
    }
}

/// An established MongoDB client and its default database.
#[derive(Debug, Clone)]
pub struct MongoConnection {
    client: Client,
    database: Database,
}

impl MongoConnection {
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.database
    }
}

#[async_trait]
impl StoreConnection for MongoConnection {
    async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Operation(e.to_string()))
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.client.clone().shutdown().await;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_member_down_keeps_the_replica_set_reachable() {
        let mut topology = TopologyHealth::default();
        assert_eq!(topology.record("a:27017", true), None);
        assert_eq!(topology.record("b:27017", true), None);

        for _ in 0..3 {
            assert_eq!(topology.record("a:27017", false), None);
            assert_eq!(topology.record("b:27017", true), None);
        }
    }

    #[test]
    fn edges_are_reported_once() {
        let mut topology = TopologyHealth::default();
        topology.record("a:27017", true);
        topology.record("b:27017", true);

        assert_eq!(topology.record("a:27017", false), None);
        assert_eq!(topology.record("b:27017", false), Some(DriverEvent::Disconnected));
        assert_eq!(topology.record("b:27017", false), None);

        assert_eq!(topology.record("a:27017", true), Some(DriverEvent::Reconnected));
        assert_eq!(topology.record("b:27017", true), None);
    }

    #[test]
    fn first_heartbeat_sets_the_baseline() {
        let mut topology = TopologyHealth::default();
        assert_eq!(topology.record("a:27017", false), None);
        assert_eq!(topology.record("a:27017", true), Some(DriverEvent::Reconnected));

        let mut topology = TopologyHealth::default();
        assert_eq!(topology.forget("a:27017"), None);
        assert_eq!(topology.record("a:27017", true), None);
    }

    #[test]
    fn losing_the_last_healthy_server_disconnects() {
        let mut topology = TopologyHealth::default();
        topology.record("a:27017", false);
        topology.record("b:27017", true);

        assert_eq!(topology.forget("b:27017"), Some(DriverEvent::Disconnected));
        assert_eq!(topology.forget("b:27017"), None);
    }
}
