//! Metrics collection and exposition.
//!
//! # Metrics
//! - `admission_decisions_total` (counter): gate outcomes by `outcome`
//! - `admission_failures_total` (counter): failed checks by `kind`
//! - `admission_check_duration_seconds` (histogram): sub-request latency
//! - `proxy_requests_total` (counter): client requests by method, status
//! - `proxy_request_duration_seconds` (histogram): end-to-end latency
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a classified admission decision.
pub fn record_admission(outcome: &'static str, started: Instant) {
    metrics::counter!("admission_decisions_total", "outcome" => outcome).increment(1);
    metrics::histogram!("admission_check_duration_seconds", "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

/// Record an admission check that failed before a decision was reached.
pub fn record_admission_failure(kind: &'static str, started: Instant) {
    metrics::counter!("admission_decisions_total", "outcome" => "failed").increment(1);
    metrics::counter!("admission_failures_total", "kind" => kind).increment(1);
    metrics::histogram!("admission_check_duration_seconds", "outcome" => "failed")
        .record(started.elapsed().as_secs_f64());
}

/// Record a completed client request.
pub fn record_request(method: &str, status: u16, started: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    metrics::counter!("proxy_requests_total", "method" => method.clone(), "status" => status.clone())
        .increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "method" => method, "status" => status)
        .record(started.elapsed().as_secs_f64());
}
