//! Reconciler and control-loop metrics (ambient concern A5): a process-wide
//! Prometheus recorder installed once, plus free functions per metric in the
//! same style as the sibling tile storage service's `storage::metrics`.

use std::sync::OnceLock;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the global Prometheus recorder exactly once. Safe to call from
/// every binary entry point; later calls are no-ops.
pub fn install_recorder_once() -> PrometheusHandle {
    PROM_HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("install prometheus recorder")
        })
        .clone()
}

pub fn vertex_evaluated(kind: &str) {
    counter!("fleetwright_vertex_evaluations_total", "kind" => kind.to_string()).increment(1);
}

pub fn vertex_failed(kind: &str) {
    counter!("fleetwright_vertex_failures_total", "kind" => kind.to_string()).increment(1);
}

pub fn vertex_duration(kind: &str, duration_secs: f64) {
    histogram!("fleetwright_vertex_duration_seconds", "kind" => kind.to_string())
        .record(duration_secs);
}

pub fn retry_attempted(site: &str) {
    counter!("fleetwright_retry_attempts_total", "site" => site.to_string()).increment(1);
}

pub fn autoscale_decision(direction: &str) {
    counter!("fleetwright_autoscale_decisions_total", "direction" => direction.to_string())
        .increment(1);
}
