//! Health endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::config::Environment;
use crate::health::report::{HealthReport, MonotonicTimestamp};
use crate::http::response::not_found;
use crate::store::StoreHandle;

pub const HEALTH_PATH: &str = "/api/health";
pub const READY_PATH: &str = "/api/health/ready";

#[derive(Clone)]
pub struct HealthState {
    pub environment: Environment,
    pub version: String,
    pub store: StoreHandle,
    pub timestamps: Arc<MonotonicTimestamp>,
}

impl HealthState {
    pub fn new(environment: Environment, version: impl Into<String>, store: StoreHandle) -> Self {
        Self {
            environment,
            version: version.into(),
            store,
            timestamps: Arc::new(MonotonicTimestamp::new()),
        }
    }

    fn report(&self) -> HealthReport {
        HealthReport {
            status: "OK".to_string(),
            timestamp: self.timestamps.next(),
            environment: self.environment.as_str().to_string(),
            version: self.version.clone(),
            store: self.store.state(),
        }
    }
}

pub fn routes(state: HealthState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(liveness).fallback(not_found))
        .route(READY_PATH, get(readiness).fallback(not_found))
        .with_state(state)
}

async fn liveness(State(state): State<HealthState>) -> Json<HealthReport> {
    Json(state.report())
}

async fn readiness(State(state): State<HealthState>) -> Response {
    let report = state.report();
    let status = if report.store.is_connected() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}
