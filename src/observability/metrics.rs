//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `http_rate_limited_total` (counter): requests rejected by the rate limiter
//! - `store_connect_attempts_total` (counter): connect attempts by outcome
//! - `store_connection_state` (gauge): 0=disconnected 1=connecting 2=connected 3=errored

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::store::ConnectionState;

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("http_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("http_rate_limited_total").increment(1);
}

pub fn record_store_attempt(outcome: &'static str) {
    counter!("store_connect_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_store_state(state: ConnectionState) {
    gauge!("store_connection_state").set(state.as_gauge());
}
