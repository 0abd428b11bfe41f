//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::any::Any;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    response::Response,
    routing::{get, post},
    Router,
};
use http_body_util::BodyExt;

use cxse_server::config::loader::finalize;
use cxse_server::config::{EnvOverrides, ServerConfig};
use cxse_server::http::AppError;
use cxse_server::routing::Collaborator;
use cxse_server::store::{
    DriverEvent, DriverEvents, StoreConnection, StoreDriver, StoreError, StoreHandle, StoreOptions,
};

pub const TEST_URI: &str = "mongodb://localhost:27017/cxse_test";
pub const PROD_ORIGIN: &str = "https://cxse.example.com";

/// Resolve a config from explicit environment variables.
pub fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
    let mut all: Vec<(String, String)> = vec![("MONGODB_URI".into(), TEST_URI.into())];
    all.extend(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    finalize(ServerConfig::default(), EnvOverrides::from_vars(all).unwrap()).unwrap()
}

pub fn production_config() -> ServerConfig {
    config_from(&[("NODE_ENV", "production"), ("ALLOWED_ORIGINS", PROD_ORIGIN)])
}

pub fn development_config() -> ServerConfig {
    config_from(&[("NODE_ENV", "development")])
}

pub fn peer(port: u16) -> ConnectInfo<SocketAddr> {
    ConnectInfo(SocketAddr::from(([10, 0, 0, 1], port)))
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn get_request(path: &str, origin: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(path);
    if let Some(origin) = origin {
        builder = builder.header("origin", origin);
    }
    builder.extension(peer(4000)).body(Body::empty()).unwrap()
}

/// What the next connect attempt should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Fail,
    Succeed,
}

/// Driver that follows a script, then succeeds forever.
pub struct ScriptedDriver {
    script: Mutex<VecDeque<Attempt>>,
    attempts: AtomicUsize,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
    close_delay: Duration,
    events: Mutex<Option<DriverEvents>>,
    connect_events: Mutex<Vec<DriverEvent>>,
}

impl ScriptedDriver {
    pub fn new(script: impl IntoIterator<Item = Attempt>) -> Arc<Self> {
        Self::with_close_delay(script, Duration::ZERO)
    }

    pub fn with_close_delay(
        script: impl IntoIterator<Item = Attempt>,
        close_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            attempts: AtomicUsize::new(0),
            live: Arc::new(AtomicUsize::new(0)),
            max_live: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
            close_delay,
            events: Mutex::new(None),
            connect_events: Mutex::new(Vec::new()),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn live_connections(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live_connections(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Events raised by the next successful attempt before it returns.
    pub fn raise_during_connect(&self, events: impl IntoIterator<Item = DriverEvent>) {
        self.connect_events.lock().unwrap().extend(events);
    }

    /// Emit an event on the most recent connection.
    pub fn emit(&self, event: DriverEvent) {
        if let Some(events) = self.events.lock().unwrap().as_ref() {
            events.emit(event);
        }
    }
}

#[async_trait]
impl StoreDriver for ScriptedDriver {
    async fn connect(
        &self,
        _options: &StoreOptions,
        events: DriverEvents,
    ) -> Result<Arc<dyn StoreConnection>, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Attempt::Succeed);

        match next {
            Attempt::Fail => Err(StoreError::Connect("connection refused".into())),
            Attempt::Succeed => {
                let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_live.fetch_max(live, Ordering::SeqCst);
                for event in self.connect_events.lock().unwrap().drain(..) {
                    events.emit(event);
                }
                *self.events.lock().unwrap() = Some(events);
                Ok(Arc::new(ScriptedConnection {
                    live: Arc::clone(&self.live),
                    closed: Arc::clone(&self.closed),
                    close_delay: self.close_delay,
                }))
            }
        }
    }
}

#[derive(Debug)]
pub struct ScriptedConnection {
    live: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
    close_delay: Duration,
}

#[async_trait]
impl StoreConnection for ScriptedConnection {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        tokio::time::sleep(self.close_delay).await;
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Collaborator exercising the store handle, body parsing and error paths.
pub struct SampleCollaborator {
    pub prefix: &'static str,
    pub hits: Arc<AtomicUsize>,
}

impl SampleCollaborator {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            hits: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Collaborator for SampleCollaborator {
    fn name(&self) -> &str {
        "sample"
    }

    fn prefix(&self) -> &str {
        self.prefix
    }

    fn routes(&self, store: StoreHandle) -> Router {
        let hits = Arc::clone(&self.hits);
        let echo_hits = Arc::clone(&self.hits);
        Router::new()
            .route(
                "/ping",
                get(move || {
                    let hits = Arc::clone(&hits);
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        "pong"
                    }
                }),
            )
            .route(
                "/echo",
                post(move |body: String| {
                    let hits = Arc::clone(&echo_hits);
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        body
                    }
                }),
            )
            .route(
                "/fail",
                get(|| async { Err::<(), AppError>(anyhow::anyhow!("db password=hunter2").into()) }),
            )
            .route("/panic", get(explode))
            .route("/slow", get(dawdle))
            .route(
                "/store",
                get(move || {
                    let store = store.clone();
                    async move {
                        store.connection()?;
                        Ok::<_, AppError>("connected")
                    }
                }),
            )
    }
}

async fn explode() -> &'static str {
    panic!("handler exploded")
}

async fn dawdle() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "late"
}
