//! Client builder for configuring transport, diagnostics and settings
//!
//! The `ClientBuilder` provides a fluent API for configuring a client
//! before it is used. It allows you to:
//! - Pick the daemon endpoint and timeout
//! - Record raw calls and faulted batches
//! - Assume a daemon version or supply a custom settings provider
//! - Configure observability (OpenTelemetry)
//!
//! Nothing touches the network while building; every SCGI connection is
//! opened per batch.
//!
//! # Examples
//!
//! ```rust,no_run
//! use rtrpc_client::ClientBuilder;
//! use rtrpc_core::ObservabilityConfig;
//! use std::time::Duration;
//!
//! # fn example() -> rtrpc_core::Result<()> {
//! // Older daemon, verbose diagnostics
//! let client = ClientBuilder::new("127.0.0.1:5000")
//!     .daemon_version("0.9.2")
//!     .timeout(Duration::from_secs(10))
//!     .log_calls(true)
//!     .build()?;
//!
//! // JSON logs only; OTLP export needs a Tokio runtime
//! let client2 = ClientBuilder::new("unix:///run/rtorrent/rpc.socket")
//!     .with_observability(ObservabilityConfig::local("torrent-dashboard"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::call_log::{CallLog, FileCallLog, TracingCallLog};
use crate::client::{ClientInner, RtClient};
use crate::config::ClientConfig;
use crate::metrics::RpcMetrics;
use crate::settings::{parse_version, RtorrentSettings, SettingsProvider};
use crate::transport::{Endpoint, ScgiTransport, Transport, DEFAULT_TIMEOUT};
use rtrpc_core::{Error, ObservabilityConfig, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Builder for configuring and creating an RtClient
pub struct ClientBuilder {
    endpoint: String,
    timeout: Duration,
    log_calls: bool,
    log_faults: bool,
    call_log: Option<Arc<dyn CallLog>>,
    call_log_path: Option<PathBuf>,
    settings: Option<Arc<dyn SettingsProvider>>,
    transport: Option<Arc<dyn Transport>>,
    daemon_version: Option<String>,
    max_content_size: Option<usize>,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ClientBuilder {
    /// Create a new client builder
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: DEFAULT_TIMEOUT,
            log_calls: false,
            log_faults: true,
            call_log: None,
            call_log_path: None,
            settings: None,
            transport: None,
            daemon_version: None,
            max_content_size: None,
            observability_config: None,
            service_name: None,
        }
    }

    /// Start from a loaded configuration
    pub fn from_config(config: ClientConfig) -> Self {
        let mut builder = Self::new(config.endpoint.clone())
            .timeout(config.timeout())
            .log_calls(config.log_calls)
            .log_faults(config.log_faults);
        builder.call_log_path = config.call_log_path;
        builder.daemon_version = config.daemon_version;
        builder.max_content_size = config.max_content_size;
        builder
    }

    /// Bound every connect, write and read
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Record every outgoing document and raw response (default off)
    pub fn log_calls(mut self, enable: bool) -> Self {
        self.log_calls = enable;
        self
    }

    /// Record the document and response of faulted important requests (default on)
    pub fn log_faults(mut self, enable: bool) -> Self {
        self.log_faults = enable;
        self
    }

    /// Sink for call and fault records (default: `tracing`)
    pub fn call_log(mut self, log: Arc<dyn CallLog>) -> Self {
        self.call_log = Some(log);
        self
    }

    /// Use a custom settings provider instead of the built-in tables
    pub fn settings(mut self, settings: Arc<dyn SettingsProvider>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Use a custom transport instead of SCGI
    ///
    /// The endpoint and timeout are ignored and calls are not recorded by
    /// the transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Assume this dotted daemon version, e.g. `0.9.8`
    pub fn daemon_version(mut self, version: impl Into<String>) -> Self {
        self.daemon_version = Some(version.into());
        self
    }

    /// Override the multicall document bound in bytes
    pub fn max_content_size(mut self, size: usize) -> Self {
        self.max_content_size = Some(size);
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    ///
    /// With traces or metrics enabled, `build` must run inside a Tokio
    /// runtime and otherwise returns `Error::Config`.
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Build the client
    pub fn build(self) -> Result<RtClient> {
        let builtin = self.builtin_settings()?;
        let settings: Arc<dyn SettingsProvider> = match (&self.settings, &builtin) {
            (Some(custom), _) => custom.clone(),
            (None, Some(builtin)) => Arc::new(builtin.clone()),
            (None, None) => return Err(Error::Internal("no settings provider".into())),
        };

        let sink = self.sink()?;
        let transport = match &self.transport {
            Some(transport) => transport.clone(),
            None => {
                let endpoint: Endpoint = self.endpoint.parse()?;
                let mut scgi = ScgiTransport::new(endpoint).with_timeout(self.timeout);
                if let (true, Some(sink)) = (self.log_calls, &sink) {
                    scgi = scgi.with_call_log(sink.clone());
                }
                Arc::new(scgi) as Arc<dyn Transport>
            }
        };
        let fault_log = if self.log_faults { sink } else { None };

        // Initialize observability if configured
        let metrics = if let Some(mut config) = self.observability_config {
            if let Some(name) = self.service_name {
                config.service_name = name;
            }

            rtrpc_core::init_observability(config.clone())
                .map_err(|e| Error::Config(format!("Failed to initialize observability: {}", e)))?;

            Some(Arc::new(RpcMetrics::new(config.service_name)))
        } else {
            None
        };

        tracing::debug!(
            endpoint = %self.endpoint,
            version = settings.version(),
            log_calls = self.log_calls,
            log_faults = fault_log.is_some(),
            "Client built"
        );

        Ok(RtClient::from_inner(ClientInner {
            settings,
            builtin: if self.settings.is_some() { None } else { builtin },
            transport,
            fault_log,
            metrics,
        }))
    }

    fn builtin_settings(&self) -> Result<Option<RtorrentSettings>> {
        if self.settings.is_some() {
            if self.daemon_version.is_some() || self.max_content_size.is_some() {
                return Err(Error::Config(
                    "daemon_version and max_content_size only apply to the built-in settings".into(),
                ));
            }
            return Ok(None);
        }

        let mut settings = match &self.daemon_version {
            Some(text) => RtorrentSettings::new(
                parse_version(text)
                    .ok_or_else(|| Error::Config(format!("invalid daemon version: {:?}", text)))?,
            ),
            None => RtorrentSettings::default(),
        };
        if let Some(size) = self.max_content_size {
            if size == 0 {
                return Err(Error::Config("max_content_size must be positive".into()));
            }
            settings = settings.with_max_content_size(size);
        }
        Ok(Some(settings))
    }

    fn sink(&self) -> Result<Option<Arc<dyn CallLog>>> {
        if !self.log_calls && !self.log_faults {
            return Ok(None);
        }
        if let Some(log) = &self.call_log {
            return Ok(Some(log.clone()));
        }
        let log: Arc<dyn CallLog> = match &self.call_log_path {
            Some(path) => Arc::new(FileCallLog::open(path)?),
            None => Arc::new(TracingCallLog),
        };
        Ok(Some(log))
    }
}
