//! OpenTelemetry trace export over OTLP.

use opentelemetry_otlp::WithExportConfig;

/// Build a batch OTLP tracer that exports to `endpoint`.
///
/// The returned tracer is handed to [`init_logging`](super::init_logging),
/// which wraps it in a `tracing-opentelemetry` layer.
pub fn build_otlp_tracer(
    endpoint: &str,
    service_name: &str,
) -> anyhow::Result<opentelemetry_sdk::trace::Tracer> {
    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(
            opentelemetry_sdk::trace::config().with_resource(opentelemetry_sdk::Resource::new(
                vec![opentelemetry::KeyValue::new(
                    "service.name",
                    service_name.to_string(),
                )],
            )),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    Ok(tracer)
}

/// Flush and shut down the global tracer provider.
pub fn shutdown_tracing() {
    opentelemetry::global::shutdown_tracer_provider();
}
