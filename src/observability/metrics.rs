//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_command_events_total` (counter): executions by command and outcome
//! - `edge_command_fallbacks_total` (counter): fallback runs by command and result
//! - `edge_command_latency_seconds` (histogram): run latency by command
//! - `edge_circuit_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `edge_endpoint_health` (gauge): 1=healthy, 0=unhealthy
//! - `edge_server_list_size` (gauge): endpoints known per client

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::{CircuitState, Outcome};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_command_event(command: &str, outcome: Outcome) {
    metrics::counter!(
        "edge_command_events_total",
        "command" => command.to_string(),
        "event" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_fallback(command: &str, succeeded: bool) {
    let result = if succeeded { "success" } else { "failure" };
    metrics::counter!(
        "edge_command_fallbacks_total",
        "command" => command.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_command_latency(command: &str, elapsed: Duration) {
    metrics::histogram!("edge_command_latency_seconds", "command" => command.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_circuit_state(command: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::Open => 1.0,
        CircuitState::HalfOpen => 2.0,
    };
    metrics::gauge!("edge_circuit_state", "command" => command.to_string()).set(value);
}

pub fn record_endpoint_health(client: &str, endpoint: &str, healthy: bool) {
    metrics::gauge!(
        "edge_endpoint_health",
        "client" => client.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_server_list_size(client: &str, size: usize) {
    metrics::gauge!("edge_server_list_size", "client" => client.to_string()).set(size as f64);
}
