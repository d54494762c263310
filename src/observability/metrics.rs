//! # Selection Metrics
//!
//! Counters, gauges and histograms for zone selection, recorded through the
//! `metrics` facade. Nothing is exported unless a recorder is installed;
//! the binary installs the Prometheus exporter when `metrics.enabled` is set.
//!
//! ## Metrics
//! - `zone_selection_total{service, outcome}`
//! - `zone_resolution_failures_total{strategy, collaborator}`
//! - `zone_cache_entries{service}`
//! - `zone_selection_duration_seconds{service}`

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

use crate::core::error::{ZoneAffinityError, ZoneAffinityResult};
use crate::observability::config::MetricsConfig;

pub const ZONE_SELECTION_TOTAL: &str = "zone_selection_total";
pub const ZONE_RESOLUTION_FAILURES_TOTAL: &str = "zone_resolution_failures_total";
pub const ZONE_CACHE_ENTRIES: &str = "zone_cache_entries";
pub const ZONE_SELECTION_DURATION_SECONDS: &str = "zone_selection_duration_seconds";

/// Buckets for selection latency; direct lookups are dominated by pod list round-trips
const SELECTION_DURATION_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Record one completed selection
pub fn record_selection(service: &str, outcome: &'static str, duration: Duration) {
    counter!(ZONE_SELECTION_TOTAL, "service" => service.to_string(), "outcome" => outcome)
        .increment(1);
    histogram!(ZONE_SELECTION_DURATION_SECONDS, "service" => service.to_string())
        .record(duration.as_secs_f64());
}

/// Record a swallowed collaborator failure
pub fn record_resolution_failure(strategy: &str, collaborator: &str) {
    counter!(
        ZONE_RESOLUTION_FAILURES_TOTAL,
        "strategy" => strategy.to_string(),
        "collaborator" => collaborator.to_string()
    )
    .increment(1);
}

/// Publish the size of a service's zone cache after a refresh
pub fn record_cache_entries(service: &str, entries: usize) {
    gauge!(ZONE_CACHE_ENTRIES, "service" => service.to_string()).set(entries as f64);
}

/// Install the global Prometheus recorder with its scrape listener
///
/// Must be called from within a tokio runtime.
pub fn install_prometheus_exporter(config: &MetricsConfig) -> ZoneAffinityResult<()> {
    let listen_address: SocketAddr = config.listen_address.parse().map_err(|e| {
        ZoneAffinityError::config(format!(
            "Invalid metrics listen address '{}': {}",
            config.listen_address, e
        ))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(listen_address)
        .set_buckets_for_metric(
            Matcher::Full(ZONE_SELECTION_DURATION_SECONDS.to_string()),
            SELECTION_DURATION_BUCKETS,
        )
        .map_err(|e| ZoneAffinityError::internal(format!("Failed to set histogram buckets: {}", e)))?
        .install()
        .map_err(|e| ZoneAffinityError::internal(format!("Failed to install Prometheus exporter: {}", e)))?;

    tracing::info!(listen_address = %listen_address, "Prometheus exporter installed");
    Ok(())
}
