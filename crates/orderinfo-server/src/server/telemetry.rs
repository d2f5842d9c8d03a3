//! # Telemetry Features
//!
//! Logging is always on: every call emits `tracing` events which are printed
//! by a `tracing_subscriber::fmt` layer filtered through `RUST_LOG` (default
//! `info`). Spans and metrics can additionally be exported via OpenTelemetry
//! to Honeycomb and/or stdout.
//!
//! ## Feature matrix
//!
//! - `otel`: export spans.
//! - `metrics`: export the service counters and histograms.
//! - `honeycomb`: OTLP/gRPC exporter configured from `HONEYCOMB_*` variables.
//! - `stdout`: print exported spans and metrics to stdout.
//!
//! Exporters need at least one of `otel` or `metrics`. Without `metrics` the
//! recording helpers at the bottom of this module do nothing.
//!
//! ```bash
//! cargo run --bin orderinfo-server --features otel,metrics,honeycomb
//! ```

#[cfg(all(
    any(feature = "honeycomb", feature = "stdout"),
    not(any(feature = "otel", feature = "metrics"))
))]
compile_error!("The 'honeycomb' and 'stdout' exporters require 'otel' or 'metrics'.");

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(any(feature = "metrics", feature = "otel"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "otel"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "otel"))]
use opentelemetry_semantic_conventions as semvcns;

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(feature = "otel")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "otel")]
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};

#[cfg(feature = "honeycomb")]
use opentelemetry_otlp::{Compression, Protocol, WithExportConfig, WithTonicConfig};
#[cfg(feature = "honeycomb")]
use tonic::{metadata::MetadataMap, transport::ClientTlsConfig};

const SERVICE_NAME: &str = "orderinfo";

/// Handles kept alive for the lifetime of the process and flushed on exit.
pub struct TelemetryProviders {
    #[cfg(feature = "otel")]
    tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes and shuts down every exporter. Failures are printed since the
    /// subscriber may already be gone.
    pub fn shutdown(&self) {
        #[cfg(feature = "otel")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {err:#?}");
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {err:#?}");
            }
        }

        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

/// Installs the global subscriber and any exporters enabled by features.
pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(any(feature = "metrics", feature = "otel"))]
    let scope = InstrumentationScope::builder(SERVICE_NAME)
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        );

    #[cfg(feature = "otel")]
    let (registry, tracer_provider) = {
        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
        let provider = build_tracer_provider()?;
        opentelemetry::global::set_tracer_provider(provider.clone());
        let layer = tracing_opentelemetry::layer()
            .with_tracer(provider.tracer_with_scope(scope.clone()))
            .with_error_records_to_exceptions(true);
        (registry.with(layer), provider)
    };

    #[cfg(feature = "metrics")]
    let (registry, meter_provider) = {
        let provider = build_meter_provider()?;
        opentelemetry::global::set_meter_provider(provider.clone());
        let _ = INSTRUMENTS.set(Instruments::new(&opentelemetry::global::meter_with_scope(
            scope,
        )));
        let layer = tracing_opentelemetry::MetricsLayer::new(provider.clone());
        (registry.with(layer), provider)
    };

    registry.init();

    Ok(TelemetryProviders {
        #[cfg(feature = "otel")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(any(feature = "metrics", feature = "otel"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

/// OTLP target read from `HONEYCOMB_ENDPOINT`, `HONEYCOMB_COMPRESSION`,
/// `HONEYCOMB_API_KEY` and `HONEYCOMB_DATASET`.
#[cfg(feature = "honeycomb")]
struct Honeycomb {
    endpoint: String,
    compression: Compression,
    metadata: MetadataMap,
}

#[cfg(feature = "honeycomb")]
impl Honeycomb {
    fn from_env() -> anyhow::Result<Self> {
        use anyhow::Context;
        use std::str::FromStr;

        let var = |name: &str| std::env::var(name).with_context(|| format!("missing `{name}`"));

        let mut metadata = MetadataMap::new();
        metadata.insert(
            "x-honeycomb-team",
            var("HONEYCOMB_API_KEY")?.parse().context("invalid API key")?,
        );
        metadata.insert(
            "x-honeycomb-dataset",
            var("HONEYCOMB_DATASET")?.parse().context("invalid dataset")?,
        );

        Ok(Self {
            endpoint: var("HONEYCOMB_ENDPOINT")?,
            compression: Compression::from_str(&var("HONEYCOMB_COMPRESSION")?.to_ascii_lowercase())?,
            metadata,
        })
    }

    /// Points a span or metric exporter builder at Honeycomb.
    fn configure<B: WithExportConfig + WithTonicConfig>(self, builder: B) -> B {
        builder
            .with_tls_config(ClientTlsConfig::new().with_native_roots())
            .with_metadata(self.metadata)
            .with_timeout(std::time::Duration::from_secs(10))
            .with_compression(self.compression)
            .with_endpoint(self.endpoint)
            .with_protocol(Protocol::Grpc)
    }
}

#[cfg(feature = "metrics")]
fn build_meter_provider() -> anyhow::Result<sdkmetrics::SdkMeterProvider> {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = builder.with_reader(
        sdkmetrics::PeriodicReader::builder(opentelemetry_stdout::MetricExporter::default())
            .with_interval(std::time::Duration::from_secs(5))
            .build(),
    );

    #[cfg(feature = "honeycomb")]
    let builder = {
        use anyhow::Context;

        let exporter = Honeycomb::from_env()?
            .configure(opentelemetry_otlp::MetricExporter::builder().with_tonic())
            .with_temporality(sdkmetrics::Temporality::Delta)
            .build()
            .context("failed to build metrics exporter")?;
        builder.with_periodic_exporter(exporter)
    };

    Ok(builder.build())
}

#[cfg(feature = "otel")]
fn build_tracer_provider() -> anyhow::Result<sdktrace::SdkTracerProvider> {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = builder.with_span_processor(batched(opentelemetry_stdout::SpanExporter::default()));

    #[cfg(feature = "honeycomb")]
    let builder = {
        use anyhow::Context;

        let exporter = Honeycomb::from_env()?
            .configure(opentelemetry_otlp::SpanExporter::builder().with_tonic())
            .build()
            .context("failed to build tracer exporter")?;
        builder.with_span_processor(batched(exporter))
    };

    Ok(builder.build())
}

#[cfg(feature = "otel")]
fn batched<E>(exporter: E) -> sdktrace::BatchSpanProcessor
where
    E: sdktrace::SpanExporter + 'static,
{
    sdktrace::BatchSpanProcessor::builder(exporter)
        .with_batch_config(
            sdktrace::BatchConfigBuilder::default()
                .with_scheduled_delay(std::time::Duration::from_secs(5))
                .with_max_queue_size(2048)
                .build(),
        )
        .build()
}

#[cfg(feature = "metrics")]
static INSTRUMENTS: OnceLock<Instruments> = OnceLock::new();

#[cfg(feature = "metrics")]
struct Instruments {
    requests: Counter<u64>,
    streams_inflight: UpDownCounter<i64>,
    errors: Counter<u64>,
    stream_duration_ms: Histogram<f64>,
    orders_ingested: Counter<u64>,
    shipments_flushed: Counter<u64>,
    search_matches: Counter<u64>,
}

#[cfg(feature = "metrics")]
impl Instruments {
    fn new(meter: &Meter) -> Self {
        let counter = |name: &'static str, description: &'static str| {
            meter.u64_counter(name).with_description(description).build()
        };

        Self {
            requests: counter("requests", "Total gRPC requests, by method"),
            streams_inflight: meter
                .i64_up_down_counter("streams_inflight")
                .with_description("Concurrent gRPC streams")
                .build(),
            errors: counter("errors", "Failed or cancelled calls"),
            stream_duration_ms: meter
                .f64_histogram("stream_duration")
                .with_unit("ms")
                .with_description("End-to-end stream duration")
                .build(),
            orders_ingested: counter("orders_ingested", "Orders written by UpdateOrders"),
            shipments_flushed: counter(
                "shipments_flushed",
                "Combined shipments emitted by ProcessOrders",
            ),
            search_matches: counter("search_matches", "Orders streamed by SearchOrders"),
        }
    }
}

/// Runs `f` once the instruments are registered.
#[cfg(feature = "metrics")]
fn record(f: impl FnOnce(&Instruments)) {
    if let Some(instruments) = INSTRUMENTS.get() {
        f(instruments);
    }
}

pub fn increment_requests(method: &'static str) {
    #[cfg(feature = "metrics")]
    record(|m| m.requests.add(1, &[KeyValue::new("method", method)]));
    #[cfg(not(feature = "metrics"))]
    let _ = method;
}

pub fn increment_streams_inflight() {
    #[cfg(feature = "metrics")]
    record(|m| m.streams_inflight.add(1, &[]));
}

pub fn decrement_streams_inflight() {
    #[cfg(feature = "metrics")]
    record(|m| m.streams_inflight.add(-1, &[]));
}

pub fn increment_stream_errors() {
    #[cfg(feature = "metrics")]
    record(|m| m.errors.add(1, &[]));
}

pub fn record_stream_duration(duration_ms: f64) {
    #[cfg(feature = "metrics")]
    record(|m| m.stream_duration_ms.record(duration_ms, &[]));
    #[cfg(not(feature = "metrics"))]
    let _ = duration_ms;
}

pub fn increment_orders_ingested(count: u64) {
    #[cfg(feature = "metrics")]
    record(|m| m.orders_ingested.add(count, &[]));
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}

pub fn increment_shipments_flushed(count: u64) {
    #[cfg(feature = "metrics")]
    record(|m| m.shipments_flushed.add(count, &[]));
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}

pub fn increment_search_matches() {
    #[cfg(feature = "metrics")]
    record(|m| m.search_matches.add(1, &[]));
}
