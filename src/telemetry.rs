use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{MetricExporter, SpanExporter};
use opentelemetry_sdk::{Resource, metrics::SdkMeterProvider, trace::SdkTracerProvider};
use tracing_opentelemetry::MetricsLayer;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::Layer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

/// OTLP export is enabled only when a collector endpoint is configured
const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

const SERVICE_NAME: &str = "site-migrate";

fn get_resource() -> Resource {
    static RESOURCE: OnceLock<Resource> = OnceLock::new();
    RESOURCE
        .get_or_init(|| Resource::builder().with_service_name(SERVICE_NAME).build())
        .clone()
}

fn init_traces() -> anyhow::Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder().with_http().build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(get_resource())
        .build())
}

fn init_metrics() -> anyhow::Result<SdkMeterProvider> {
    let exporter = MetricExporter::builder().with_http().build()?;

    Ok(SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(get_resource())
        .build())
}

// Initialize tracing-subscriber and return OtelGuard for opentelemetry-related termination processing
pub fn init_tracing_subscriber() -> anyhow::Result<OtelGuard> {
    let providers = match std::env::var(OTLP_ENDPOINT_VAR) {
        Ok(endpoint) if !endpoint.trim().is_empty() => Some((init_traces()?, init_metrics()?)),
        _ => None,
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_default_env());

    let metrics_layer = providers
        .as_ref()
        .map(|(_, meter_provider)| MetricsLayer::new(meter_provider.clone()));
    let trace_layer = providers
        .as_ref()
        .map(|(tracer_provider, _)| OpenTelemetryLayer::new(tracer_provider.tracer(SERVICE_NAME)));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(metrics_layer)
        .with(trace_layer)
        .try_init()?;

    Ok(OtelGuard { providers })
}

/// Flushes and shuts down the exporters when dropped
pub struct OtelGuard {
    providers: Option<(SdkTracerProvider, SdkMeterProvider)>,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        let Some((tracer_provider, meter_provider)) = self.providers.take() else {
            return;
        };
        if let Err(err) = tracer_provider.shutdown() {
            eprintln!("{err:?}");
        }
        if let Err(err) = meter_provider.shutdown() {
            eprintln!("{err:?}");
        }
    }
}
