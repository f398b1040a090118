//! Tracing setup. Check the docs for [`init_tracing`].

use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_otlp::{ExporterBuildError, SpanExporter};
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use opentelemetry_semantic_conventions::resource::SERVICE_VERSION;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE_NAME: &str = "statsd-sampler";

/// Set to `1` or `true` for JSON log lines.
pub const LOG_JSON_ENV: &str = "SAMPLER_LOG_JSON";

/// Set to an OTLP/HTTP endpoint to export spans.
pub const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Install the global tracing subscriber.
///
/// Log lines go to stdout, filtered by `RUST_LOG` when it is set and by
/// `info` (or `debug`, when `verbose`) otherwise. Setting
/// [`SAMPLER_LOG_JSON`](LOG_JSON_ENV) switches the lines to JSON.
///
/// When [`OTEL_EXPORTER_OTLP_ENDPOINT`](OTLP_ENDPOINT_ENV) is set, spans are
/// also exported over OTLP/HTTP. Every tick of every item is a span, and the
/// sender's write of each sample happens inside the span of the tick that
/// took it, so a trace viewer shows a tick together with the datagrams it
/// produced. The returned provider must be shut down before exit to flush
/// whatever is still batched.
pub fn init_tracing(verbose: bool) -> Result<Option<SdkTracerProvider>, ExporterBuildError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let json = std::env::var(LOG_JSON_ENV)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);
    let (json_layer, text_layer) = if json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    let provider = match std::env::var_os(OTLP_ENDPOINT_ENV) {
        Some(_) => Some(otlp_provider()?),
        None => None,
    };
    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(otel_layer)
        .init();

    Ok(provider)
}

/// The exporter reads its endpoint, headers and timeout from the standard
/// `OTEL_EXPORTER_OTLP_*` variables.
fn otlp_provider() -> Result<SdkTracerProvider, ExporterBuildError> {
    let exporter = SpanExporter::builder().with_http().build()?;

    let resource = Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_attribute(KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")))
        .build();

    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build();
    opentelemetry::global::set_tracer_provider(provider.clone());
    Ok(provider)
}
