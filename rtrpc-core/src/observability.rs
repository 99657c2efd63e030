//! OpenTelemetry setup for rtrpc
//!
//! The engine itself only emits `tracing` events and records metrics through
//! `opentelemetry::global`. Whether those go anywhere is decided by the
//! embedding application, which calls [`init_observability`] once at
//! startup and [`shutdown_observability`] before exiting.
//!
//! Three pipelines can be switched independently:
//!
//! - **Traces**: spans around each request run, exported over OTLP/gRPC
//! - **Metrics**: call counters and latency histograms, exported every 30s
//! - **Logs**: JSON lines on stdout, filtered by `RUST_LOG` or `log_level`
//!
//! # Usage
//!
//! ```rust,no_run
//! use rtrpc_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("webui-backend")
//!         .with_endpoint("http://localhost:4317")
//!         .with_log_level("rtrpc=debug,info");
//!
//!     rtrpc_core::init_observability(config).expect("Failed to init observability");
//!
//!     // ... talk to the daemon ...
//!
//!     rtrpc_core::shutdown_observability();
//! }
//! ```
//!
//! The OTLP exporters need a Tokio runtime. Without one,
//! [`init_observability`] returns an error unless both exporting pipelines
//! are disabled (see [`ObservabilityConfig::local`]).
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector endpoint
//! - `OTEL_SERVICE_NAME`: service name reported in telemetry
//! - `RUST_LOG`: log filter directives

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{metrics::SdkMeterProvider, trace::SdkTracerProvider};
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Error returned by the telemetry pipeline setup
pub type InitError = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_SERVICE_NAME: &str = "rtrpc";
const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";
const METRICS_EXPORT_INTERVAL: Duration = Duration::from_secs(30);

// Handles kept for shutdown; the global registry only hands out tracers and meters
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();
static METER_PROVIDER: OnceLock<SdkMeterProvider> = OnceLock::new();

/// Observability configuration for OpenTelemetry
///
/// # Defaults
///
/// - Service name: `$OTEL_SERVICE_NAME` or "rtrpc"
/// - Service version: the crate version
/// - OTLP endpoint: `$OTEL_EXPORTER_OTLP_ENDPOINT` or "http://localhost:4317"
/// - All pipelines enabled
/// - Log level: `$RUST_LOG` or "info"
///
/// # Examples
///
/// ```rust
/// use rtrpc_core::ObservabilityConfig;
///
/// let config = ObservabilityConfig::new("torrent-dashboard")
///     .with_endpoint("http://collector:4317")
///     .with_metrics(false);
/// assert!(!config.enable_metrics);
/// ```
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name attached to every span and metric
    pub service_name: String,

    /// Service version attached to every span and metric
    pub service_version: String,

    /// gRPC endpoint of the OTLP collector
    pub otlp_endpoint: String,

    /// Export spans
    pub enable_traces: bool,

    /// Export metrics
    pub enable_metrics: bool,

    /// Emit JSON log lines
    pub enable_logs: bool,

    /// Filter directives used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: std::env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| DEFAULT_SERVICE_NAME.to_string()),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_OTLP_ENDPOINT.to_string()),
            enable_traces: true,
            enable_metrics: true,
            enable_logs: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl ObservabilityConfig {
    /// Create a configuration with a custom service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Local logging only: no OTLP export
    ///
    /// Useful for command-line tools that talk to a daemon once and exit.
    pub fn local(service_name: impl Into<String>) -> Self {
        Self::new(service_name).with_traces(false).with_metrics(false)
    }

    /// Set the OTLP collector endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    /// Set the log filter directives
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Enable or disable span export
    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    /// Enable or disable metrics export
    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    /// Enable or disable JSON log output
    pub fn with_logs(mut self, enable: bool) -> Self {
        self.enable_logs = enable;
        self
    }

    /// The collector endpoint, checked to be an `http(s)://` URL with a host
    fn collector_endpoint(&self) -> Result<&str, InitError> {
        let endpoint = self.otlp_endpoint.trim();
        let authority = endpoint
            .strip_prefix("http://")
            .or_else(|| endpoint.strip_prefix("https://"));
        match authority {
            Some(rest) if !rest.is_empty() && !rest.starts_with('/') => Ok(endpoint),
            _ => Err(format!("invalid OTLP endpoint {:?}", self.otlp_endpoint).into()),
        }
    }

    fn resource(&self) -> opentelemetry_sdk::Resource {
        opentelemetry_sdk::Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Initialize the telemetry pipelines
///
/// Call once per process. The global tracing subscriber can only be
/// installed once, so a second call returns an error.
///
/// # Errors
///
/// - traces or metrics are enabled and the endpoint is not an `http(s)` URL
/// - traces or metrics are enabled outside a Tokio runtime
/// - the OTLP exporters cannot be built
/// - the log filter directives are invalid
/// - a global subscriber is already installed
pub fn init_observability(config: ObservabilityConfig) -> Result<(), InitError> {
    if config.enable_traces || config.enable_metrics {
        config.collector_endpoint()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err("OTLP export requires a Tokio runtime; \
                        initialize inside one or disable traces and metrics"
                .into());
        }
    }

    // The tracer must exist before the subscriber, which wraps it in a layer
    let tracer = if config.enable_traces {
        Some(init_tracer(&config)?)
    } else {
        None
    };

    if config.enable_metrics {
        init_metrics(&config)?;
    }

    init_tracing_subscriber(&config, tracer)?;

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        logs = config.enable_logs,
        "OpenTelemetry initialized"
    );

    Ok(())
}

fn init_tracer(config: &ObservabilityConfig) -> Result<opentelemetry_sdk::trace::Tracer, InitError> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.collector_endpoint()?)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    let tracer = provider.tracer(config.service_name.clone());
    let _ = TRACER_PROVIDER.set(provider.clone());
    global::set_tracer_provider(provider);

    Ok(tracer)
}

fn init_metrics(config: &ObservabilityConfig) -> Result<(), InitError> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.collector_endpoint()?)
        .build()?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(METRICS_EXPORT_INTERVAL)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build();

    let _ = METER_PROVIDER.set(provider.clone());
    global::set_meter_provider(provider);
    Ok(())
}

fn init_tracing_subscriber(
    config: &ObservabilityConfig,
    tracer: Option<opentelemetry_sdk::trace::Tracer>,
) -> Result<(), InitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let fmt_layer = config.enable_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .json()
    });
    let telemetry_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Flush and shut down the telemetry pipelines
///
/// Exports pending spans and metrics, then stops the exporters. Safe to
/// call more than once, and a no-op when nothing was exported.
pub fn shutdown_observability() {
    tracing::info!("Shutting down OpenTelemetry");

    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            tracing::debug!(error = %e, "Tracer provider shutdown");
        }
    }
    if let Some(provider) = METER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            tracing::debug!(error = %e, "Meter provider shutdown");
        }
    }

    tracing::info!("OpenTelemetry shutdown complete");
}
