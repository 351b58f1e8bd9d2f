use anyhow::{Context, Result, anyhow};
use opentelemetry::trace::{TraceContextExt, Tracer, TracerProvider as OtelTracerProvider};
use opentelemetry::{Context as OtelContext, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{
    BatchConfigBuilder, BatchSpanProcessor, SdkTracerProvider, SpanExporter,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Telemetry handle for OpenTelemetry tracing.
pub(crate) struct Telemetry {
    tracer: opentelemetry_sdk::trace::SdkTracer,
    provider: SdkTracerProvider,
}

impl Telemetry {
    /// Initialize telemetry with an OTLP HTTP exporter.
    pub(crate) fn new(endpoint: String) -> Result<Self> {
        let endpoint = normalize_otlp_http_trace_endpoint(&endpoint)?;
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .build()
            .context("build OTLP span exporter")?;
        Self::from_exporter(exporter)
    }

    /// Run a closure inside a span when telemetry is enabled.
    pub(crate) fn in_span<T, F>(&self, name: &str, attributes: &[KeyValue], f: F) -> T
    where
        F: FnOnce() -> T,
    {
        self.tracer.in_span(name.to_string(), |cx| {
            let span = cx.span();
            for attribute in attributes {
                span.set_attribute(attribute.clone());
            }
            f()
        })
    }

    /// Flush spans and shut down the tracer provider.
    pub(crate) fn shutdown(&self) -> Result<()> {
        if let Err(err) = self.provider.shutdown() {
            return Err(anyhow!("failed to shutdown tracer provider: {err}"));
        }
        Ok(())
    }

    fn from_exporter<E: SpanExporter + 'static>(exporter: E) -> Result<Self> {
        let resource = Resource::builder().with_service_name("dataflint").build();
        // Rules end spans on rayon workers; the batch processor only needs a
        // channel send there and exports from its own thread.
        let batch_config = BatchConfigBuilder::default()
            .with_max_queue_size(16_384)
            .with_max_export_batch_size(1024)
            .with_scheduled_delay(Duration::from_millis(200))
            .build();
        let processor = BatchSpanProcessor::builder(exporter)
            .with_batch_config(batch_config)
            .build();
        let provider = SdkTracerProvider::builder()
            .with_resource(resource)
            .with_span_processor(processor)
            .build();
        let tracer = provider.tracer("dataflint");
        opentelemetry::global::set_tracer_provider(provider.clone());
        Ok(Self { tracer, provider })
    }
}

fn normalize_otlp_http_trace_endpoint(endpoint: &str) -> Result<String> {
    let mut url = reqwest::Url::parse(endpoint).context("parse OTLP endpoint")?;
    let path = url.path().to_string();
    if path == "/" {
        url.set_path("/v1/traces");
    } else if let Some(prefix) = path.strip_suffix("/v1/logs") {
        url.set_path(&format!("{prefix}/v1/traces"));
    }
    Ok(url.to_string())
}

/// Initialize logging facade with stderr output.
///
/// `RUST_LOG` wins over the default filter; `quiet` lowers the default to errors.
pub(crate) fn init_logging(quiet: bool) {
    let default_filter = if quiet { "error" } else { "dataflint=info,warn" };
    let init_result = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
    let _ = init_result;
}

/// Attach an event to the active span; a no-op outside any span.
pub(crate) fn add_current_span_event(name: &str, attributes: &[KeyValue]) {
    let cx = OtelContext::current();
    let span = cx.span();
    if !span.span_context().is_valid() {
        return;
    }
    span.add_event(name.to_string(), attributes.to_vec());
}

/// Trace ID of the active span, when one is recording.
pub(crate) fn current_trace_id() -> Option<String> {
    let cx = OtelContext::current();
    let span = cx.span();
    let span_context = span.span_context();
    if !span_context.is_valid() {
        return None;
    }
    Some(span_context.trace_id().to_string())
}

/// Optional telemetry span helper.
pub(crate) fn with_span<T, F>(
    telemetry: Option<&Telemetry>,
    name: &str,
    attributes: &[KeyValue],
    f: F,
) -> T
where
    F: FnOnce() -> T,
{
    match telemetry {
        Some(telemetry) => telemetry.in_span(name, attributes, f),
        None => f(),
    }
}
