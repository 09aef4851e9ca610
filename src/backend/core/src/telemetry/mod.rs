//! Telemetry: logging, tracing export and metrics.
//!
//! - **Logging**: Structured JSON/pretty logging with credential redaction
//! - **Tracing**: Optional OTLP span export through OpenTelemetry
//! - **Metrics**: Prometheus counters for auth outcomes and errors
//!
//! # Example
//!
//! ```rust,no_run
//! use taskgate_core::config::ObservabilityConfig;
//! use taskgate_core::telemetry::init_telemetry;
//!
//! let handle = init_telemetry(&ObservabilityConfig::default(), "taskgate-server")
//!     .expect("Failed to initialize telemetry");
//! ```

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use logging::{init_logging, LogFormat, LoggingConfig, RedactionConfig, SensitiveFieldRedactor};
pub use metrics::{init_metrics, AuthMetrics, MetricsConfig, MetricsRegistry};

use crate::config::ObservabilityConfig;

/// Initialize metrics, the optional OTLP exporter, and logging.
///
/// Call once at startup, from within a tokio runtime.
pub fn init_telemetry(
    config: &ObservabilityConfig,
    service_name: &str,
) -> anyhow::Result<TelemetryHandle> {
    let metrics = init_metrics(&config.metrics, service_name)?;

    let tracer = config
        .otlp_endpoint
        .as_deref()
        .map(|endpoint| self::tracing::build_otlp_tracer(endpoint, service_name))
        .transpose()?;
    let otlp_enabled = tracer.is_some();

    init_logging(&config.logging, &config.environment, tracer)?;

    Ok(TelemetryHandle {
        metrics,
        otlp_enabled,
    })
}

/// Handle for managing telemetry lifecycle.
#[derive(Debug)]
pub struct TelemetryHandle {
    /// Registry backing the `/metrics` endpoint
    pub metrics: MetricsRegistry,
    otlp_enabled: bool,
}

impl TelemetryHandle {
    /// Flush pending spans.
    pub fn shutdown(self) {
        if self.otlp_enabled {
            self::tracing::shutdown_tracing();
        }
        ::tracing::info!("Telemetry shutdown complete");
    }
}
