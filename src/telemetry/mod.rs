mod config;
mod shutdown;

pub use config::TelemetryConfig;
pub use shutdown::TelemetryGuard;

use crate::error::{Result, WardenError};
use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const EXPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Install the global subscriber.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
/// When `OTEL_ENABLED` is set, spans are also exported over OTLP/HTTP; an
/// exporter that cannot be built degrades to stderr logging only.
pub fn init_telemetry() -> Result<TelemetryGuard> {
    let config = TelemetryConfig::from_env();

    let provider = if config.enabled {
        match build_provider(&config) {
            Ok(provider) => Some(provider),
            Err(e) => {
                eprintln!("OpenTelemetry disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let otel_layer = provider.as_ref().map(|provider| {
        opentelemetry::global::set_tracer_provider(provider.clone());
        tracing_opentelemetry::layer().with_tracer(provider.tracer("specwarden"))
    });

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true),
        )
        .with(otel_layer)
        .init();

    match &provider {
        Some(_) => tracing::info!(endpoint = %config.endpoint, "Exporting spans over OTLP"),
        None => tracing::debug!("Tracing initialized without export"),
    }

    Ok(TelemetryGuard::new(provider))
}

fn build_provider(config: &TelemetryConfig) -> Result<SdkTracerProvider> {
    let client = reqwest::Client::builder().timeout(EXPORT_TIMEOUT).build()?;

    let exporter = SpanExporter::builder()
        .with_http()
        .with_http_client(client)
        .with_endpoint(&config.endpoint)
        .with_protocol(Protocol::HttpBinary)
        .with_timeout(EXPORT_TIMEOUT)
        .with_headers(config.headers.clone())
        .build()
        .map_err(|e| WardenError::TelemetryError(format!("OTLP exporter: {}", e)))?;

    let resource = Resource::builder_empty()
        .with_service_name(config.service_name.clone())
        .with_attributes([KeyValue::new("service.version", env!("CARGO_PKG_VERSION"))])
        .build();

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}
