//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_invoke_attempts_total` (counter): proposal attempts, retries included
//! - `gateway_invoke_total` (counter): finished invokes by `outcome`
//! - `gateway_invoke_duration_seconds` (histogram): end-to-end invoke latency by `outcome`
//! - `gateway_retries_total` (counter): repeated attempts by `operation`
//! - `gateway_commit_wait_seconds` (histogram): commit-wait duration by `outcome`
//! - `gateway_queries_total` (counter): chaincode queries by `channel`
//! - `gateway_blocks_relayed_total` (counter): published block events by `channel`
//!
//! # Design Decisions
//! - Exposed through the Prometheus exporter's own HTTP listener
//! - Recording without an installed exporter is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_invoke_attempt() {
    counter!("gateway_invoke_attempts_total").increment(1);
}

pub fn record_invoke(outcome: &'static str, started: Instant) {
    counter!("gateway_invoke_total", "outcome" => outcome).increment(1);
    histogram!("gateway_invoke_duration_seconds", "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_retry(operation: &str) {
    counter!("gateway_retries_total", "operation" => operation.to_string()).increment(1);
}

pub fn record_commit_wait(outcome: &'static str, started: Instant) {
    histogram!("gateway_commit_wait_seconds", "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_query(channel: &str) {
    counter!("gateway_queries_total", "channel" => channel.to_string()).increment(1);
}

pub fn record_block_relayed(channel: &str) {
    counter!("gateway_blocks_relayed_total", "channel" => channel.to_string()).increment(1);
}
