//! Metrics collection and exposition.
//!
//! # Metrics
//! - `balancer_clients_accepted_total` (counter)
//! - `balancer_accept_errors_total` (counter)
//! - `balancer_backend_connects_total` (counter): by backend, outcome
//! - `balancer_bytes_relayed_total` (counter): by direction
//! - `balancer_pairs_closed_total` (counter)
//! - `balancer_active_pairs` (gauge)

use std::net::SocketAddr;

use ::metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener on `addr`.
///
/// The exporter serves scrapes from its own background thread.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_client_accepted() {
    counter!("balancer_clients_accepted_total").increment(1);
}

pub fn record_accept_error() {
    counter!("balancer_accept_errors_total").increment(1);
}

pub fn record_backend_connect(backend: SocketAddr, outcome: &'static str) {
    counter!(
        "balancer_backend_connects_total",
        "backend" => backend.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_bytes_relayed(direction: &'static str, bytes: usize) {
    counter!("balancer_bytes_relayed_total", "direction" => direction).increment(bytes as u64);
}

pub fn record_pair_closed() {
    counter!("balancer_pairs_closed_total").increment(1);
}

pub fn set_active_pairs(pairs: usize) {
    gauge!("balancer_active_pairs").set(pairs as f64);
}
