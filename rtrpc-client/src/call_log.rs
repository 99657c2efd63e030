//! Diagnostic sinks for raw RPC traffic
//!
//! A [`CallLog`] receives outgoing documents and raw responses verbatim.
//! Recording never fails from the caller's point of view; a sink that
//! cannot write reports the problem through `tracing` and carries on.

use rtrpc_core::{Error, Result};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Tracing target used by [`TracingCallLog`]
pub const CALL_LOG_TARGET: &str = "rtrpc::calls";

/// Sink for raw request and response text
pub trait CallLog: Send + Sync + fmt::Debug {
    /// Record one blob
    fn record(&self, blob: &str);
}

/// Emits each blob as a `debug` event on target `rtrpc::calls`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCallLog;

impl CallLog for TracingCallLog {
    fn record(&self, blob: &str) {
        tracing::debug!(target: CALL_LOG_TARGET, bytes = blob.len(), "{}", blob);
    }
}

/// Appends each blob plus a newline to a file
#[derive(Debug)]
pub struct FileCallLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileCallLog {
    /// Open `path` for appending, creating it if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::Config(format!("cannot open call log {}: {}", path.display(), e)))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CallLog for FileCallLog {
    fn record(&self, blob: &str) {
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(file, "{}", blob) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to write call log");
        }
    }
}
