//! Batching XML-RPC client for rTorrent over SCGI
//!
//! This crate talks to a running rTorrent daemon through its SCGI
//! listener. Queued commands are translated for the daemon's version,
//! packed into as few `system.multicall` documents as the size bound
//! allows, and the responses are decoded into flat value lists.
//!
//! # Core Features
//!
//! - **Version-aware names**: legacy method names are rewritten for modern
//!   daemons (`d.get_name` becomes `d.name` from 0.9 on)
//! - **Batching**: many commands per round trip, bounded by document size
//! - **Pseudo-commands**: `trk` and `stg` expand into tracker and settings
//!   summaries
//! - **Two decoding modes**: interleaved values or separate string and
//!   integer lists
//! - **SCGI transport**: TCP or Unix sockets, one connection per batch
//! - **Diagnostics**: raw call logging, fault logging, OpenTelemetry
//!   metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rtrpc_client::{Command, RtClient};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RtClient::connect("127.0.0.1:5000")?;
//!
//!     // One call
//!     let version = client.call("system.client_version", std::iter::empty::<&str>())?;
//!     println!("daemon {}", version[0]);
//!
//!     // Several commands, one round trip
//!     let mut request = client
//!         .request()
//!         .command(client.command("d.get_name", ["0123ABCD"]))
//!         .command(client.command("d.get_size_bytes", ["0123ABCD"]));
//!     if request.success(true) {
//!         println!("{:?}", request.results());
//!     } else {
//!         eprintln!("request failed: {}", request.failure());
//!     }
//!
//!     // Rows of a download multicall
//!     for row in client.multicall("d", "main", &["d.get_hash=", "d.get_name="])? {
//!         println!("{} {}", row[0], row[1]);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! ```rust,no_run
//! use rtrpc_client::{ClientBuilder, ClientConfig};
//!
//! # fn example() -> rtrpc_core::Result<()> {
//! let client = ClientBuilder::from_config(ClientConfig::from_env()?)
//!     .service_name("torrent-dashboard")
//!     .build()?
//!     .with_detected_version()?;
//! # Ok(())
//! # }
//! ```

mod batch;
mod call_log;
mod client;
mod client_builder;
mod command;
mod config;
mod expand;
mod metrics;
mod request;
mod settings;
pub mod transport;

pub use batch::{Batch, BatchBuilder};
pub use call_log::{CallLog, FileCallLog, TracingCallLog, CALL_LOG_TARGET};
pub use client::{RtClient, CLIENT_VERSION_METHOD};
pub use client_builder::ClientBuilder;
pub use command::{needs_target, Command, MULTICALL_PREFIX};
pub use config::{ClientConfig, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS};
pub use expand::{
    expand_legacy, expand_settings_summary, expand_tracker_summary, is_pseudo_command,
    SETTINGS_SUMMARY, TRACKER_SUMMARY,
};
pub use metrics::RpcMetrics;
pub use request::{Request, RunOutcome};
pub use settings::{
    format_version, parse_version, CommandAlias, RtorrentSettings, SettingsProvider,
    DEFAULT_MAX_CONTENT_SIZE, PROBE_COMMAND,
};
pub use transport::{Endpoint, ScgiTransport, Transport};
