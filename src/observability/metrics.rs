//! Metrics collection and exposition.
//!
//! # Metrics
//! - `deferred_transitions_total` (counter): terminal transitions by outcome
//! - `deferred_rejections_total` (counter): rejected operations by operation
//! - `deferred_listener_failures_total` (counter): isolated listener panics
//! - `deferred_in_flight` (gauge): registered, unresolved responses
//! - `deferred_resolve_duration_seconds` (histogram): creation to resolution
//! - `deferred_http_requests_total` (counter): binding requests by route, status

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_transition(outcome: &'static str, elapsed: Duration) {
    ::metrics::counter!("deferred_transitions_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("deferred_resolve_duration_seconds", "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}

pub fn record_rejection(operation: &'static str) {
    ::metrics::counter!("deferred_rejections_total", "operation" => operation).increment(1);
}

pub fn record_listener_failure() {
    ::metrics::counter!("deferred_listener_failures_total").increment(1);
}

pub fn record_in_flight(count: usize) {
    ::metrics::gauge!("deferred_in_flight").set(count as f64);
}

pub fn record_request(route: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "deferred_http_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("deferred_http_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}
