//! Error types for rtrpc
//!
//! This module provides the error handling used by every layer of the
//! engine. It defines two main types:
//!
//! - **Error**: Application-level errors for internal use (uses thiserror)
//! - **Fault**: The daemon's wire-format RPC error (`faultCode`/`faultString`)
//!
//! # Error Categories
//!
//! - **Transport errors**: Connect, Io, Timeout, EmptyResponse
//! - **Decoding errors**: Parse
//! - **RPC errors**: Fault (the request reached the daemon and was rejected)
//! - **Setup errors**: InvalidEndpoint, Config
//!
//! The request orchestrator collapses all of these into a boolean result,
//! keeping the last error around for inspection.
//!
//! # Examples
//!
//! ```rust
//! use rtrpc_core::{Error, Fault};
//!
//! let fault = Fault::new(-506, "Method 'd.nonexistent' not defined");
//! let error = Error::from(fault);
//! assert!(error.is_fault());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for rtrpc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Application-level error type for rtrpc operations
///
/// Every variant carries owned data so errors can be cloned into a
/// request's `last_error` slot and handed back to callers later.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The daemon answered with an XML-RPC fault
    #[error("RPC fault: {0}")]
    Fault(#[from] Fault),

    /// Response bytes were present but could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Input/output error while talking to the daemon
    #[error("IO error: {0}")]
    Io(String),

    /// The daemon's endpoint could not be reached
    #[error("Connection failed: {0}")]
    Connect(String),

    /// A blocking connect, write or read exceeded the configured timeout
    #[error("Request timeout")]
    Timeout,

    /// The connection closed without a single response byte
    #[error("Empty response")]
    EmptyResponse,

    /// An endpoint string could not be parsed or used on this platform
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected internal condition
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is an RPC fault rather than a transport or
    /// decoding failure
    pub fn is_fault(&self) -> bool {
        matches!(self, Error::Fault(_))
    }

    /// Short stable label used as a metrics attribute
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Fault(_) => "fault",
            Error::Parse(_) => "parse",
            Error::Io(_) => "io",
            Error::Connect(_) => "connect",
            Error::Timeout => "timeout",
            Error::EmptyResponse => "empty_response",
            Error::InvalidEndpoint(_) => "invalid_endpoint",
            Error::Config(_) => "config",
            Error::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Error::Timeout,
            _ => Error::Io(err.to_string()),
        }
    }
}

/// XML-RPC fault as reported by the daemon
///
/// A fault arrives inside a successfully transmitted response as a struct
/// with `faultCode` and `faultString` members. Inside a `system.multicall`
/// response each failing call carries its own fault struct; the first one
/// found is reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    /// Numeric fault code (rTorrent uses negative codes, e.g. -501)
    pub code: i64,

    /// Human-readable fault message
    pub message: String,
}

impl Fault {
    /// Create a new fault with code and message
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Fault whose members could not be extracted from the response
    pub fn unknown() -> Self {
        Self::new(0, "")
    }
}

impl std::fmt::Display for Fault {
    /// Formats as "[code] message", e.g. "[-501] Could not find info-hash."
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for Fault {}
