//! Pipeline metrics collection and exposition.
//!
//! # Metrics
//! - `tracehub_spans_ingested_total` (counter)
//! - `tracehub_spans_dropped_total` (counter): buffer-cap evictions
//! - `tracehub_spans_flushed_total` (counter)
//! - `tracehub_flush_failures_total` (counter)
//! - `tracehub_flush_duration_seconds` (histogram)
//!
//! Recording is a no-op until `init_metrics` installs the exporter, so
//! library users who skip it pay nothing.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "failed to start metrics endpoint"),
    }
}

pub fn record_span_ingested() {
    counter!("tracehub_spans_ingested_total").increment(1);
}

pub fn record_spans_dropped(count: u64) {
    counter!("tracehub_spans_dropped_total").increment(count);
}

pub fn record_flush(count: u64, started: Instant) {
    counter!("tracehub_spans_flushed_total").increment(count);
    histogram!("tracehub_flush_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_flush_failure() {
    counter!("tracehub_flush_failures_total").increment(1);
}
