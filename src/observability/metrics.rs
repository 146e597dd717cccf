//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, cluster
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_pipeline_events_total` (counter): strategy events by name
//! - `gateway_destination_healthy` (gauge): 1=eligible, 0=excluded
//! - `gateway_admission_in_flight` (gauge): operations holding a permit
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - Labels are low-cardinality (no paths, no request ids)

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, cluster: &str, duration: Duration) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "cluster" => cluster.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "cluster" => cluster.to_string())
        .record(duration.as_secs_f64());
}

pub fn record_event(event: &'static str) {
    metrics::counter!("gateway_pipeline_events_total", "event" => event).increment(1);
}

pub fn record_destination_health(destination: &str, eligible: bool) {
    metrics::gauge!("gateway_destination_healthy", "destination" => destination.to_string())
        .set(if eligible { 1.0 } else { 0.0 });
}

pub const ADMISSION_IN_FLIGHT: &str = "gateway_admission_in_flight";

pub fn admission_acquired() {
    metrics::gauge!(ADMISSION_IN_FLIGHT).increment(1.0);
}

pub fn admission_released() {
    metrics::gauge!(ADMISSION_IN_FLIGHT).decrement(1.0);
}
