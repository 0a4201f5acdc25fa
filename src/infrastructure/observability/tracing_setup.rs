//! Subscriber setup with optional OpenTelemetry export

use opentelemetry::{trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use super::config::TracingConfig;
use crate::config::{LogFormat, LoggingConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber
///
/// `RUST_LOG` overrides the configured level when set.
pub fn init_tracing(logging_config: &LoggingConfig, tracing_config: &TracingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging_config.level));

    let fmt_layer: BoxedLayer = match logging_config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
    };

    let mut layers = vec![fmt_layer];
    let mut otel_error = None;

    if tracing_config.enabled {
        match init_otel_tracing(tracing_config) {
            Ok(provider) => {
                let tracer = provider.tracer(tracing_config.service_name.clone());
                opentelemetry::global::set_tracer_provider(provider);
                layers.push(tracing_opentelemetry::layer().with_tracer(tracer).boxed());
            }
            Err(e) => otel_error = Some(e),
        }
    }

    let installed = tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init();

    if installed.is_err() {
        return;
    }

    match (tracing_config.enabled, otel_error) {
        (true, None) => tracing::info!(
            "Tracing initialized with OpenTelemetry export to {}",
            tracing_config.otlp_endpoint
        ),
        (true, Some(e)) => tracing::warn!(
            "Failed to initialize OpenTelemetry: {}. Tracing export disabled.",
            e
        ),
        (false, _) => tracing::info!("Tracing initialized with level: {}", logging_config.level),
    }
}

fn init_otel_tracing(
    config: &TracingConfig,
) -> Result<TracerProvider, opentelemetry::trace::TraceError> {
    let resource = Resource::new(vec![KeyValue::new(
        "service.name",
        config.service_name.clone(),
    )]);

    let sampler = match config.effective_sampling_ratio() {
        ratio if ratio >= 1.0 => Sampler::AlwaysOn,
        ratio if ratio <= 0.0 => Sampler::AlwaysOff,
        ratio => Sampler::TraceIdRatioBased(ratio),
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()?;

    let provider = TracerProvider::builder()
        .with_sampler(sampler)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .with_batch_exporter(exporter, runtime::Tokio)
        .build();

    Ok(provider)
}

/// Flush pending spans
pub fn shutdown_tracing() {
    opentelemetry::global::shutdown_tracer_provider();
}
