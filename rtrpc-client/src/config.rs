//! Client configuration
//!
//! [`ClientConfig`] collects everything needed to build an [`RtClient`]
//! without code: where the daemon listens, how long to wait for it, which
//! diagnostics to record and which daemon version to assume.
//!
//! Values come from defaults, a JSON document or `RTRPC_*` environment
//! variables. Missing fields keep their defaults.
//!
//! | Variable                 | Field              |
//! |--------------------------|--------------------|
//! | `RTRPC_ENDPOINT`         | `endpoint`         |
//! | `RTRPC_TIMEOUT`          | `timeout_secs`     |
//! | `RTRPC_LOG_CALLS`        | `log_calls`        |
//! | `RTRPC_LOG_FAULTS`       | `log_faults`       |
//! | `RTRPC_CALL_LOG`         | `call_log_path`    |
//! | `RTRPC_DAEMON_VERSION`   | `daemon_version`   |
//! | `RTRPC_MAX_CONTENT_SIZE` | `max_content_size` |
//!
//! # Examples
//!
//! ```rust
//! use rtrpc_client::ClientConfig;
//!
//! let config = ClientConfig::from_json(r#"{"endpoint": "10.0.0.2:5000", "log_calls": true}"#).unwrap();
//! assert_eq!(config.endpoint, "10.0.0.2:5000");
//! assert_eq!(config.timeout_secs, 5);
//! assert!(config.log_calls);
//! ```
//!
//! [`RtClient`]: crate::RtClient

use crate::settings::parse_version;
use rtrpc_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default daemon endpoint
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:5000";

/// Default timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Configuration of a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `host:port` or `unix:///path/to/socket`
    pub endpoint: String,

    /// Connect, write and read timeout
    pub timeout_secs: u64,

    /// Record every outgoing document and raw response
    pub log_calls: bool,

    /// Record the document and response of faulted important requests
    pub log_faults: bool,

    /// File receiving the call log instead of `tracing`
    pub call_log_path: Option<PathBuf>,

    /// Dotted daemon version such as `0.9.8`
    pub daemon_version: Option<String>,

    /// Multicall document bound in bytes
    pub max_content_size: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_calls: false,
            log_faults: true,
            call_log_path: None,
            daemon_version: None,
            max_content_size: None,
        }
    }
}

impl ClientConfig {
    /// Parse a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid client config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read `RTRPC_*` variables from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Read `RTRPC_*` variables through `lookup`
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(endpoint) = lookup("RTRPC_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Some(timeout) = lookup("RTRPC_TIMEOUT") {
            config.timeout_secs = parse_number("RTRPC_TIMEOUT", &timeout)?;
        }
        if let Some(flag) = lookup("RTRPC_LOG_CALLS") {
            config.log_calls = parse_flag("RTRPC_LOG_CALLS", &flag)?;
        }
        if let Some(flag) = lookup("RTRPC_LOG_FAULTS") {
            config.log_faults = parse_flag("RTRPC_LOG_FAULTS", &flag)?;
        }
        if let Some(path) = lookup("RTRPC_CALL_LOG") {
            config.call_log_path = Some(PathBuf::from(path));
        }
        if let Some(version) = lookup("RTRPC_DAEMON_VERSION") {
            config.daemon_version = Some(version);
        }
        if let Some(size) = lookup("RTRPC_MAX_CONTENT_SIZE") {
            config.max_content_size = Some(parse_number("RTRPC_MAX_CONTENT_SIZE", &size)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::Config("endpoint must not be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout must be at least one second".into()));
        }
        if self.max_content_size == Some(0) {
            return Err(Error::Config("max_content_size must be positive".into()));
        }
        self.packed_version()?;
        Ok(())
    }

    /// Timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Packed form of `daemon_version`, if one is set
    pub fn packed_version(&self) -> Result<Option<u32>> {
        match &self.daemon_version {
            None => Ok(None),
            Some(text) => parse_version(text)
                .map(Some)
                .ok_or_else(|| Error::Config(format!("invalid daemon version: {:?}", text))),
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a number, got {:?}", key, value)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::Config(format!("{} must be a boolean, got {:?}", key, value))),
    }
}
