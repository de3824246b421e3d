//! Metrics collection and exposition.
//!
//! # Metrics
//! - `petal_sessions_total` (counter): finished sessions by outcome
//! - `petal_active_sessions` (gauge): sessions currently registered
//! - `petal_payload_bytes` (histogram): received payload sizes
//! - `petal_classification_seconds` (histogram): classifier latency

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished session.
pub fn record_session(outcome: &'static str) {
    metrics::counter!("petal_sessions_total", "outcome" => outcome).increment(1);
}

/// Record the current registry size.
pub fn record_active_sessions(count: usize) {
    metrics::gauge!("petal_active_sessions").set(count as f64);
}

/// Record a fully received payload.
pub fn record_payload(bytes: usize) {
    metrics::histogram!("petal_payload_bytes").record(bytes as f64);
}

/// Record classifier latency from `start`.
pub fn record_classification(start: Instant) {
    metrics::histogram!("petal_classification_seconds").record(start.elapsed().as_secs_f64());
}
