//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define server metrics (RPS, latency, in-flight requests)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `http_requests_total` (counter): total requests by method, route, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `http_requests_in_flight` (gauge): requests currently being handled
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Route label is the pattern, not the raw path, to bound cardinality

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Label used when no route matched.
pub const UNMATCHED_ROUTE: &str = "none";

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a completed request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let method = method.to_string();
    let route = route.to_string();
    let status = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status.clone()
    )
    .increment(1);
    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "route" => route,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

/// Adjust the in-flight gauge.
pub fn set_in_flight(count: u64) {
    metrics::gauge!("http_requests_in_flight").set(count as f64);
}
