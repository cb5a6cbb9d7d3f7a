use std::sync::OnceLock;

use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

static PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

fn init_tracer(level: &str) -> SdkTracerProvider {
    // Spans (one per host operation) are exported to stdout
    let sdk_provider = SdkTracerProvider::builder()
        .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
        .build();

    let tracer = sdk_provider.tracer("host-server");
    global::set_tracer_provider(sdk_provider.clone());

    let telemetry = tracing_opentelemetry::layer()
        .with_tracer(tracer);

    Registry::default()
        .with(EnvFilter::new(level))
        .with(tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
        )
        .with(telemetry)
        .init();

    sdk_provider
}

pub fn init(level: &str) {
    PROVIDER.get_or_init(|| init_tracer(level));
}

/// Flushes and shuts down the span exporter. Safe to call when `init` never ran.
pub fn shutdown() {
    if let Some(provider) = PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Failed to shut down tracer provider: {e}");
        }
    }
}
