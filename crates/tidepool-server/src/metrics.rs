//! Metrics collection and export for tidepool.
//!
//! Uses the `metrics` crate for instrumentation. The Prometheus exporter is
//! only installed when enabled in the config; otherwise every call here is a
//! no-op.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "tidepool_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "tidepool_connections_active";
    pub const COMMANDS_TOTAL: &str = "tidepool_commands_total";
    pub const MESSAGES_PUBLISHED: &str = "tidepool_messages_published_total";
    pub const MESSAGES_PUBLISHED_BYTES: &str = "tidepool_messages_published_bytes";
    pub const MESSAGES_DELIVERED: &str = "tidepool_messages_delivered_total";
    pub const TOPICS_ACTIVE: &str = "tidepool_topics_active";
    pub const COMMAND_LATENCY_SECONDS: &str = "tidepool_command_latency_seconds";
    pub const ERRORS_TOTAL: &str = "tidepool_errors_total";
}

/// Describe all metrics.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of open connections"
    );
    metrics::describe_counter!(names::COMMANDS_TOTAL, "Commands received, by kind");
    metrics::describe_counter!(names::MESSAGES_PUBLISHED, "Messages appended to topics");
    metrics::describe_counter!(
        names::MESSAGES_PUBLISHED_BYTES,
        "Bytes of message content appended to topics"
    );
    metrics::describe_counter!(
        names::MESSAGES_DELIVERED,
        "Messages written to consumers"
    );
    metrics::describe_gauge!(names::TOPICS_ACTIVE, "Current number of topics");
    metrics::describe_histogram!(
        names::COMMAND_LATENCY_SECONDS,
        "Time from command line to final response line"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors, by type");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a received command.
pub fn record_command(kind: &'static str) {
    counter!(names::COMMANDS_TOTAL, "kind" => kind).increment(1);
}

/// Record a published message.
pub fn record_published(bytes: usize) {
    counter!(names::MESSAGES_PUBLISHED).increment(1);
    counter!(names::MESSAGES_PUBLISHED_BYTES).increment(bytes as u64);
}

/// Record messages written by a consume.
pub fn record_delivered(count: usize) {
    counter!(names::MESSAGES_DELIVERED).increment(count as u64);
}

/// Update the topic count.
pub fn set_active_topics(count: usize) {
    gauge!(names::TOPICS_ACTIVE).set(count as f64);
}

/// Record command latency.
pub fn record_latency(seconds: f64) {
    histogram!(names::COMMAND_LATENCY_SECONDS).record(seconds);
}

/// Record an error.
pub fn record_error(error_type: &'static str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type).increment(1);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}
