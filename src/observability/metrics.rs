//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by route, status
//! - `proxy_request_duration_seconds` (histogram): latency by route
//! - `proxy_cache_lookups_total` (counter): lookups by cache, result
//! - `proxy_cache_entries` (gauge): stored entries by cache
//! - `proxy_upstream_errors_total` (counter): upstream failures by route, kind
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus
//! recorder, so tests and metric-less deployments pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished proxy request.
pub fn record_request(route: &str, status: u16, start: Instant) {
    counter!("proxy_requests_total", "route" => route.to_owned(), "status" => status.to_string())
        .increment(1);
    histogram!("proxy_request_duration_seconds", "route" => route.to_owned())
        .record(start.elapsed().as_secs_f64());
}

/// Record a cache lookup outcome.
pub fn record_cache_lookup(cache: &'static str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("proxy_cache_lookups_total", "cache" => cache, "result" => result).increment(1);
}

/// Record the number of entries held by a cache.
pub fn record_cache_size(cache: &'static str, entries: usize) {
    gauge!("proxy_cache_entries", "cache" => cache).set(entries as f64);
}

/// Record an upstream failure (`timeout`, `transport`, `status`).
pub fn record_upstream_error(route: &'static str, kind: &'static str) {
    counter!("proxy_upstream_errors_total", "route" => route, "kind" => kind).increment(1);
}
