//! Metrics collection and exposition.
//!
//! # Metrics
//! - `podping_blocks_processed_total` (counter)
//! - `podping_events_dispatched_total` (counter)
//! - `podping_handler_failures_total` (counter): by `kind` (error, timeout, panic)
//! - `podping_node_failures_total` (counter): by `node`
//! - `podping_endpoint_healthy` (gauge): 1=selectable, 0=cooling down
//! - `podping_broadcasts_total` (counter): by `outcome`
//! - `podping_reader_cursor` (gauge): next block to process
//! - `podping_resource_credits_percent` (gauge): by `account`

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_block_processed(block_number: u64, events: usize) {
    metrics::counter!("podping_blocks_processed_total").increment(1);
    metrics::counter!("podping_events_dispatched_total").increment(events as u64);
    metrics::gauge!("podping_reader_cursor").set((block_number + 1) as f64);
}

pub fn record_handler_failure(kind: &'static str) {
    metrics::counter!("podping_handler_failures_total", "kind" => kind).increment(1);
}

pub fn record_node_failure(node: &str) {
    metrics::counter!("podping_node_failures_total", "node" => node.to_string()).increment(1);
}

pub fn record_endpoint_health(node: &str, healthy: bool) {
    metrics::gauge!("podping_endpoint_healthy", "node" => node.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_broadcast(outcome: &'static str) {
    metrics::counter!("podping_broadcasts_total", "outcome" => outcome).increment(1);
}

pub fn record_credits(account: &str, percentage: f64) {
    metrics::gauge!("podping_resource_credits_percent", "account" => account.to_string())
        .set(percentage);
}
