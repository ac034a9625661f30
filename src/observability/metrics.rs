//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_round_trips_total` (counter): completed round trips by status
//! - `proxy_round_trip_duration_seconds` (histogram): upstream latency
//! - `proxy_upstream_errors_total` (counter): failed upstream calls
//! - `proxy_capture_errors_total` (counter): capture failures by side, kind

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_round_trip(status: u16, elapsed: Duration) {
    ::metrics::counter!("proxy_round_trips_total", "status" => status.to_string()).increment(1);
    ::metrics::histogram!("proxy_round_trip_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_upstream_error() {
    ::metrics::counter!("proxy_upstream_errors_total").increment(1);
}

pub fn record_capture_error(side: &'static str, kind: &'static str) {
    ::metrics::counter!("proxy_capture_errors_total", "side" => side, "kind" => kind).increment(1);
}
