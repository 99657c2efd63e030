//! XML-RPC client handle for an rTorrent daemon
//!
//! This module provides the main `RtClient` type, which bundles the
//! settings provider, the transport and the diagnostic sinks every request
//! needs, and offers shortcuts for the most common calls.
//!
//! # Client Lifecycle
//!
//! 1. **Build**: pick an endpoint and options (no I/O happens yet)
//! 2. **Detect** (optional): ask the daemon for its version
//! 3. **Use**: create requests, or use `call`/`multicall`
//!
//! # Cloning
//!
//! `RtClient` is cheaply cloneable using `Arc` internally. All clones
//! share the same settings and sinks. Each request opens its own SCGI
//! connections, so clones can be used from several threads at once.

use crate::call_log::CallLog;
use crate::client_builder::ClientBuilder;
use crate::command::Command;
use crate::metrics::RpcMetrics;
use crate::request::Request;
use crate::settings::{parse_version, RtorrentSettings, SettingsProvider};
use crate::transport::Transport;
use rtrpc_core::{Arg, Error, Result, Value};
use std::sync::Arc;

/// Daemon method reporting its version string
pub const CLIENT_VERSION_METHOD: &str = "system.client_version";

#[derive(Debug)]
pub(crate) struct ClientInner {
    pub(crate) settings: Arc<dyn SettingsProvider>,
    /// Built-in tables, kept so the version can be swapped later
    pub(crate) builtin: Option<RtorrentSettings>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) fault_log: Option<Arc<dyn CallLog>>,
    pub(crate) metrics: Option<Arc<RpcMetrics>>,
}

/// XML-RPC client for an rTorrent daemon
#[derive(Debug, Clone)]
pub struct RtClient {
    inner: Arc<ClientInner>,
}

impl RtClient {
    /// Build a client for `endpoint` with default options
    ///
    /// `endpoint` is `host:port` or `unix:///path/to/socket`.
    pub fn connect(endpoint: &str) -> Result<Self> {
        ClientBuilder::new(endpoint).build()
    }

    /// Start configuring a client for `endpoint`
    pub fn builder(endpoint: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(endpoint)
    }

    pub(crate) fn from_inner(inner: ClientInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Settings provider shared by every request of this client
    pub fn settings(&self) -> &dyn SettingsProvider {
        self.inner.settings.as_ref()
    }

    /// A new empty request
    pub fn request(&self) -> Request {
        let mut request = Request::new(self.inner.settings.clone(), self.inner.transport.clone());
        if let Some(log) = &self.inner.fault_log {
            request = request.with_fault_log(log.clone());
        }
        if let Some(metrics) = &self.inner.metrics {
            request = request.with_metrics(metrics.clone());
        }
        request
    }

    /// A command whose name is translated for this daemon right away
    pub fn command<I>(&self, method: &str, args: I) -> Command
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        Command::resolved(self.settings(), method, args)
    }

    /// Run one method and return every decoded value
    ///
    /// A fault becomes `Error::Fault`; other failures return the error the
    /// request recorded.
    pub fn call<I>(&self, method: &str, args: I) -> Result<Vec<Value>>
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        let mut request = self.request().command(self.command(method, args));
        if request.success(true) {
            Ok(request.take_results())
        } else {
            Err(request.failure())
        }
    }

    /// Run `<scope>.multicall` and return one row per item
    ///
    /// Each row holds one value per getter, in getter order.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # fn example(client: &rtrpc_client::RtClient) -> rtrpc_core::Result<()> {
    /// let trackers = client.multicall("t", "0123ABCD", &["t.get_url=", "t.is_enabled="])?;
    /// for row in trackers {
    ///     println!("{} enabled={}", row[0], row[1]);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn multicall<S: AsRef<str>>(
        &self,
        scope: &str,
        target: &str,
        getters: &[S],
    ) -> Result<Vec<Vec<Value>>> {
        let command = Command::multicall(self.settings(), scope, target, getters);
        let mut request = self.request().command(command);
        if !request.success(true) {
            return Err(request.failure());
        }
        Ok(request
            .rows(getters.len())
            .into_iter()
            .map(<[Value]>::to_vec)
            .collect())
    }

    /// Ask the daemon for its version, packed
    pub fn detect_version(&self) -> Result<u32> {
        let values = self.call(CLIENT_VERSION_METHOD, std::iter::empty::<&str>())?;
        let text = values
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Parse("client version is not a string".into()))?;

        let version = parse_version(text)
            .ok_or_else(|| Error::Parse(format!("unrecognized client version {:?}", text)))?;
        tracing::info!(version = %text, "Detected daemon version");
        Ok(version)
    }

    /// A client whose built-in settings match the daemon's reported version
    ///
    /// Fails with `Error::Config` when the client uses a custom settings
    /// provider.
    pub fn with_detected_version(&self) -> Result<Self> {
        let builtin = self.inner.builtin.as_ref().ok_or_else(|| {
            Error::Config("version detection needs the built-in settings".into())
        })?;
        let version = self.detect_version()?;
        let builtin = builtin.for_version(version);

        Ok(Self::from_inner(ClientInner {
            settings: Arc::new(builtin.clone()),
            builtin: Some(builtin),
            transport: self.inner.transport.clone(),
            fault_log: self.inner.fault_log.clone(),
            metrics: self.inner.metrics.clone(),
        }))
    }
}
