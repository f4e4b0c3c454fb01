//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rosnode_shutdown_hook_failures_total` (counter): hooks that panicked, by phase
//! - `rosnode_shutdown_duration_seconds` (histogram): full shutdown sequence
//! - `rosnode_shutdown_threads_abandoned_total` (counter): joins that timed out
//! - `rosnode_log_suppressed_total` (counter): rate-limited records, by policy
//! - `rosnode_rpc_cache_entries` (gauge): cached RPC clients
//!
//! Recording is a no-op until a recorder is installed, so library users that
//! never call [`init_metrics`] pay nothing.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::lifecycle::HookPhase;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_hook_failure(phase: HookPhase) {
    counter!("rosnode_shutdown_hook_failures_total", "phase" => phase.to_string()).increment(1);
}

pub fn record_shutdown_duration(elapsed: Duration) {
    histogram!("rosnode_shutdown_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_thread_abandoned() {
    counter!("rosnode_shutdown_threads_abandoned_total").increment(1);
}

pub fn record_log_suppressed(policy: &'static str) {
    counter!("rosnode_log_suppressed_total", "policy" => policy).increment(1);
}

pub fn record_rpc_cache_size(entries: usize) {
    gauge!("rosnode_rpc_cache_entries").set(entries as f64);
}
