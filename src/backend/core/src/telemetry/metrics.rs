//! Prometheus metrics for authentication and authorization outcomes.
//!
//! Counters are recorded through the `metrics` facade; when [`init_metrics`]
//! has installed the Prometheus recorder, [`MetricsRegistry::render`] exposes
//! them in text format for the `/metrics` endpoint. Without a recorder every
//! call is a no-op, which is what tests rely on.
//!
//! # Example
//!
//! ```rust,no_run
//! use taskgate_core::telemetry::metrics::AuthMetrics;
//!
//! AuthMetrics::record_auth_failure("expired_token");
//! AuthMetrics::record_gate_denial("permission");
//! ```

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;
use std::collections::HashMap;

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    /// Global labels to add to all metrics
    #[serde(default)]
    pub global_labels: HashMap<String, String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            global_labels: HashMap::new(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

/// Handle to the installed Prometheus recorder.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    prometheus_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("prometheus_handle", &self.prometheus_handle.is_some())
            .finish()
    }
}

impl MetricsRegistry {
    /// A registry with no recorder behind it; renders an empty body.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.prometheus_handle
            .as_ref()
            .map(|h| h.render())
            .unwrap_or_default()
    }
}

/// Initialize the metrics subsystem.
///
/// # Errors
///
/// Returns an error if a global recorder is already installed.
pub fn init_metrics(config: &MetricsConfig, service_name: &str) -> anyhow::Result<MetricsRegistry> {
    if !config.enabled {
        return Ok(MetricsRegistry::disabled());
    }

    let mut builder = PrometheusBuilder::new();
    for (key, value) in &config.global_labels {
        builder = builder.add_global_label(key, value);
    }

    let handle = builder.install_recorder()?;
    register_metric_descriptions();

    tracing::info!(service_name = %service_name, "Metrics initialized");

    Ok(MetricsRegistry {
        prometheus_handle: Some(handle),
    })
}

fn register_metric_descriptions() {
    describe_counter!(
        "taskgate_auth_success_total",
        "Successful authentications by method"
    );
    describe_counter!(
        "taskgate_auth_failures_total",
        "Rejected authentications by reason"
    );
    describe_counter!(
        "taskgate_gate_denials_total",
        "Requests denied by an authorization gate"
    );
    describe_counter!("taskgate_tokens_issued_total", "Token pairs issued");
    describe_counter!(
        "taskgate_token_refresh_total",
        "Refresh token redemptions by outcome"
    );
    describe_counter!(
        "taskgate_refresh_cleanup_removed_total",
        "Expired refresh tokens purged by the cleanup task"
    );
    describe_counter!("taskgate_errors_total", "Errors by code, category and severity");
}

/// Auth-domain counters.
pub struct AuthMetrics;

impl AuthMetrics {
    /// `method` is `password` for logins and `access_token` for bearer requests.
    pub fn record_auth_success(method: &'static str) {
        counter!("taskgate_auth_success_total", "method" => method).increment(1);
    }

    pub fn record_auth_failure(reason: &'static str) {
        counter!("taskgate_auth_failures_total", "reason" => reason).increment(1);
    }

    pub fn record_gate_denial(gate: &'static str) {
        counter!("taskgate_gate_denials_total", "gate" => gate).increment(1);
    }

    pub fn record_tokens_issued() {
        counter!("taskgate_tokens_issued_total").increment(1);
    }

    /// `outcome` is one of `rotated`, `replayed`, `expired`, `invalid`, `delete_failed`.
    pub fn record_refresh(outcome: &'static str) {
        counter!("taskgate_token_refresh_total", "outcome" => outcome).increment(1);
    }

    pub fn record_cleanup(removed: u64) {
        counter!("taskgate_refresh_cleanup_removed_total").increment(removed);
    }
}
