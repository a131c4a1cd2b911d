use crate::error::{Result, TabchatError};
use opentelemetry::{trace::TracerProvider as _, KeyValue};
use opentelemetry_sdk::Resource;
use std::env;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Console log format, selected via `TABCHAT_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        match env::var("TABCHAT_LOG_FORMAT").as_deref() {
            Ok("json") | Ok("jsonl") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Flushes buffered spans on shutdown.
pub struct TelemetryGuard {
    tracer_provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("error shutting down tracer provider: {}", e);
            }
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
}

fn otlp_endpoint() -> Option<String> {
    if !env::var("TABCHAT_ENABLE_TRACING")
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
    {
        return None;
    }
    env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()
}

/// Set up logging for the whole process: console output always, span export
/// only when an OTLP endpoint is configured and export is enabled.
pub fn init_tracing(service_name: &str) -> Result<TelemetryGuard> {
    let format = LogFormat::from_env();

    let Some(endpoint) = otlp_endpoint() else {
        init_console_only(format);
        tracing::info!(service = service_name, "logging initialized");
        return Ok(TelemetryGuard {
            tracer_provider: None,
        });
    };

    let provider = build_otlp_provider(service_name, &endpoint)?;
    let telemetry =
        tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.to_string()));

    match format {
        LogFormat::Compact => tracing_subscriber::registry()
            .with(telemetry)
            .with(tracing_subscriber::fmt::layer())
            .with(env_filter())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(telemetry)
            .with(tracing_subscriber::fmt::layer().json())
            .with(env_filter())
            .init(),
    }

    tracing::info!(
        service = service_name,
        endpoint = %endpoint,
        "opentelemetry tracing initialized"
    );

    Ok(TelemetryGuard {
        tracer_provider: Some(provider),
    })
}

fn init_console_only(format: LogFormat) {
    match format {
        LogFormat::Compact => {
            tracing_subscriber::fmt().with_env_filter(env_filter()).init()
        }
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter())
            .init(),
    }
}

fn build_otlp_provider(
    service_name: &str,
    endpoint: &str,
) -> Result<opentelemetry_sdk::trace::SdkTracerProvider> {
    use opentelemetry_otlp::WithExportConfig;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| TabchatError::Tracing(format!("exporter build failed: {}", e)))?;

    let resource = Resource::builder_empty()
        .with_attribute(KeyValue::new("service.name", service_name.to_string()))
        .build();

    Ok(opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}
