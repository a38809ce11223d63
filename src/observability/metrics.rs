//! Metrics collection and exposition.
//!
//! # Metrics
//! - `api_requests_total` (counter): completed requests by method, status
//! - `api_request_duration_seconds` (histogram): request latency by method
//! - `api_rate_limited_total` (counter): requests rejected by the limiter
//!
//! # Design Decisions
//! - Recording sites are the terminal error boundary (sees every final
//!   status) and the rate limiter (sees rejections it owns)
//! - The Prometheus endpoint is optional and bound on its own address

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
///
/// Failure to install is logged, not fatal: the service is still useful
/// without an exporter.
pub fn init(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(err) => tracing::error!(error = %err, "Failed to start metrics endpoint"),
    }
}

/// Record one completed request.
pub fn record_request(method: &str, status: u16, started: Instant) {
    counter!(
        "api_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "api_request_duration_seconds",
        "method" => method.to_string()
    )
    .record(started.elapsed().as_secs_f64());
}

/// Record a request rejected by the rate limiter.
pub fn record_rate_limited() {
    counter!("api_rate_limited_total").increment(1);
}
