//! RTRPC - rTorrent XML-RPC over SCGI
//!
//! This is the main convenience crate that re-exports all RTRPC sub-crates.
//! Use this crate if you want a single dependency for talking to an
//! rTorrent daemon.
//!
//! # Architecture
//!
//! RTRPC is organized into modular crates:
//!
//! - **rtrpc-core**: Parameters, values, the XML codec and response scanner,
//!   error handling, observability
//! - **rtrpc-client**: Commands, version-aware settings, batching, the SCGI
//!   transport, requests and the client handle
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rtrpc::RtClient;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RtClient::connect("127.0.0.1:5000")?.with_detected_version()?;
//!
//!     let downloads = client.multicall("d", "main", &["d.get_hash=", "d.get_name=", "d.get_complete="])?;
//!     for row in downloads {
//!         println!("{} {} complete={}", row[0], row[1], row[2]);
//!     }
//!     Ok(())
//! }
//! ```

// Re-export all public APIs from sub-crates
pub use rtrpc_client as client;
pub use rtrpc_core as core;

// Convenience re-exports of the most commonly used types
pub use rtrpc_client::{ClientBuilder, ClientConfig, Command, Request, RtClient};
pub use rtrpc_core::{Error, Fault, Result, Value};
