//! Core XML-RPC types and codec for rtrpc
//!
//! This crate holds the transport-independent half of the rTorrent RPC
//! engine:
//!
//! - **Types**: typed call parameters and decoded response values
//! - **Codec**: byte-exact rendering of plain and `system.multicall` calls
//! - **Scan**: streaming extraction of scalar values and faults from responses
//! - **Error handling**: the error enum shared by every layer
//! - **Observability**: OpenTelemetry integration for traces, metrics and logs
//!
//! The `rtrpc-client` crate builds commands, batches and the SCGI transport
//! on top of this foundation.
//!
//! # Example
//!
//! ```rust
//! use rtrpc_core::{codec, scan::ParseMode, Param, ResponseParser, Value};
//!
//! let doc = codec::render_call("d.get_name", &[Param::string("0123ABCD")]);
//! assert!(doc.starts_with(codec::XML_PROLOG));
//!
//! let reply = "<methodResponse><params><param><value><string>debian.iso</string></value></param></params></methodResponse>";
//! let parsed = ParseMode::Generic.parser().parse(reply).unwrap();
//! assert_eq!(parsed.values, vec![Value::from("debian.iso")]);
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod scan;
pub mod types;

pub use error::{Error, Fault, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use scan::{GenericParser, ParseMode, ParsedResponse, ResponseParser, TypedParser};
pub use types::{Arg, Param, ParamKind, Value};
