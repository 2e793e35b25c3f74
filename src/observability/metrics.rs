//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dv_advertisements_sent_total` (counter): payloads handed to the channel, by router
//! - `dv_advertisements_dropped_total` (counter): payloads discarded by a loss policy
//! - `dv_advertisements_received_total` (counter): payloads with at least one valid record, by router
//! - `dv_route_updates_total` (counter): table entries improved by merging, by router
//! - `dv_resolution_table_size` (gauge): entries in the shared resolution table
//! - `dv_resolutions_total` (counter): resolutions by source (routing, fallback, failed)
//! - `dv_proxy_sessions_total` (counter): proxy sessions by outcome
//! - `dv_proxy_active_connections` (gauge): open proxy sessions
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_advertisement_sent(router: &str) {
    counter!("dv_advertisements_sent_total", "router" => router.to_string()).increment(1);
}

pub fn record_advertisement_dropped() {
    counter!("dv_advertisements_dropped_total").increment(1);
}

pub fn record_advertisement_received(router: &str) {
    counter!("dv_advertisements_received_total", "router" => router.to_string()).increment(1);
}

pub fn record_route_updates(router: &str, updated: usize) {
    counter!("dv_route_updates_total", "router" => router.to_string()).increment(updated as u64);
}

pub fn record_resolution_table_size(size: usize) {
    gauge!("dv_resolution_table_size").set(size as f64);
}

pub fn record_resolution(source: &'static str) {
    counter!("dv_resolutions_total", "source" => source).increment(1);
}

pub fn record_session(outcome: &'static str) {
    counter!("dv_proxy_sessions_total", "outcome" => outcome).increment(1);
}

pub fn record_active_connections(active: u64) {
    gauge!("dv_proxy_active_connections").set(active as f64);
}
