//! Response scanning and decoding
//!
//! Responses are not parsed into a tree. The daemon's reply is a flat walk
//! over `<value>` nodes, and callers rely only on the order of the scalar
//! nodes, so this module streams through the document and yields every
//! string- or integer-tagged value node in document order. Container nodes
//! (`<array>`, `<struct>`) are stepped over; their scalar children are
//! picked up as the scan continues.
//!
//! Two parser strategies sit on top of the scanner:
//!
//! - [`GenericParser`]: one interleaved list of decoded values
//! - [`TypedParser`]: separate ordered lists of strings and integers
//!
//! Both detect faults the same way: once value parsing has succeeded, a
//! response containing `faultCode` is a fault.
//!
//! # Examples
//!
//! ```rust
//! use rtrpc_core::scan::{ParseMode, ResponseParser, Value};
//!
//! let body = "<methodResponse><params><param><value><string>ubuntu.iso</string></value>\
//!             </param></params></methodResponse>";
//! let parsed = ParseMode::Generic.parser().parse(body).unwrap();
//! assert_eq!(parsed.values, vec![Value::from("ubuntu.iso")]);
//! assert!(parsed.fault.is_none());
//! ```

use crate::codec::{decode_text, FAULT_MARKER};
use crate::error::{Error, Fault, Result};
pub use crate::types::Value;

const VALUE_OPEN: &str = "<value>";
const STRING_OPEN: &str = "<string>";
const STRING_CLOSE: &str = "</string></value>";
const EMPTY_STRING: &str = "<string/></value>";
const INTEGER_TAGS: [&str; 3] = ["i4", "i8", "int"];

/// Kind of a scalar value node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// `<string>` node
    String,
    /// `<i4>`, `<i8>` or `<int>` node
    Integer,
}

/// A scalar value node found in a response, with its raw payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueNode<'a> {
    /// Node kind
    pub kind: NodeKind,
    /// Payload between the tags, not yet decoded
    pub raw: &'a str,
}

impl ValueNode<'_> {
    /// Decode the payload into a [`Value`]
    pub fn decode(&self) -> Result<Value> {
        match self.kind {
            NodeKind::String => Ok(Value::String(decode_text(self.raw))),
            NodeKind::Integer => self.decode_integer().map(Value::Integer),
        }
    }

    fn decode_integer(&self) -> Result<i64> {
        self.raw
            .trim()
            .parse()
            .map_err(|_| Error::Parse(format!("invalid integer payload '{}'", self.raw)))
    }
}

/// Iterator over the scalar value nodes of a document, in order
#[derive(Debug, Clone)]
pub struct ValueNodes<'a> {
    rest: &'a str,
}

impl<'a> ValueNodes<'a> {
    /// Start scanning a document
    pub fn new(document: &'a str) -> Self {
        Self { rest: document }
    }
}

impl<'a> Iterator for ValueNodes<'a> {
    type Item = ValueNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let start = self.rest.find(VALUE_OPEN)?;
            let after = &self.rest[start + VALUE_OPEN.len()..];
            self.rest = after;

            if let Some(body) = after.strip_prefix(STRING_OPEN) {
                if let Some(end) = body.find(STRING_CLOSE) {
                    self.rest = &body[end + STRING_CLOSE.len()..];
                    return Some(ValueNode {
                        kind: NodeKind::String,
                        raw: &body[..end],
                    });
                }
                continue;
            }

            if let Some(tail) = after.strip_prefix(EMPTY_STRING) {
                self.rest = tail;
                return Some(ValueNode {
                    kind: NodeKind::String,
                    raw: "",
                });
            }

            if let Some((tag, body)) = integer_open(after) {
                let close = format!("</{}></value>", tag);
                if let Some(end) = body.find(&close) {
                    self.rest = &body[end + close.len()..];
                    return Some(ValueNode {
                        kind: NodeKind::Integer,
                        raw: &body[..end],
                    });
                }
            }
        }
    }
}

/// Match an opening integer tag, returning the tag name and what follows it
fn integer_open(text: &str) -> Option<(&'static str, &str)> {
    let inner = text.strip_prefix('<')?;
    INTEGER_TAGS.iter().find_map(|tag| {
        inner
            .strip_prefix(tag)
            .and_then(|rest| rest.strip_prefix('>'))
            .map(|body| (*tag, body))
    })
}

/// Decoded content of one response document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    /// Interleaved values in document order (generic mode)
    pub values: Vec<Value>,
    /// String values in document order (typed mode)
    pub strings: Vec<String>,
    /// Integer values in document order (typed mode)
    pub integers: Vec<i64>,
    /// Fault reported by the daemon, if any
    pub fault: Option<Fault>,
}

/// A response decoding strategy
pub trait ResponseParser: Send + Sync {
    /// Decode a response document
    ///
    /// Returns `Error::Parse` when the document does not meet the
    /// strategy's success criterion.
    fn parse(&self, body: &str) -> Result<ParsedResponse>;
}

/// Collects string and integer values interleaved, in document order
///
/// Succeeds when at least one value node is found.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericParser;

impl ResponseParser for GenericParser {
    fn parse(&self, body: &str) -> Result<ParsedResponse> {
        let values = ValueNodes::new(body)
            .map(|node| node.decode())
            .collect::<Result<Vec<_>>>()?;

        if values.is_empty() {
            return Err(Error::Parse("response contains no value nodes".into()));
        }

        Ok(ParsedResponse {
            values,
            fault: detect_fault(body),
            ..ParsedResponse::default()
        })
    }
}

/// Collects strings and integers into two separate ordered lists
///
/// Succeeds only when both lists are non-empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypedParser;

impl ResponseParser for TypedParser {
    fn parse(&self, body: &str) -> Result<ParsedResponse> {
        let mut strings = Vec::new();
        let mut integers = Vec::new();
        for node in ValueNodes::new(body) {
            match node.kind {
                NodeKind::String => strings.push(decode_text(node.raw)),
                NodeKind::Integer => integers.push(node.decode_integer()?),
            }
        }

        if strings.is_empty() || integers.is_empty() {
            return Err(Error::Parse(format!(
                "typed response needs string and integer values (strings={}, integers={})",
                strings.len(),
                integers.len()
            )));
        }

        Ok(ParsedResponse {
            strings,
            integers,
            fault: detect_fault(body),
            ..ParsedResponse::default()
        })
    }
}

/// Selects the response decoding strategy of a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Interleaved values (default)
    #[default]
    Generic,
    /// Segregated string and integer lists
    Typed,
}

impl ParseMode {
    /// Strategy implementing this mode
    pub fn parser(self) -> &'static dyn ResponseParser {
        match self {
            ParseMode::Generic => &GenericParser,
            ParseMode::Typed => &TypedParser,
        }
    }
}

/// Detect a fault and extract its code and message
///
/// Any response containing the fault marker is a fault. Code and message
/// come from the first `faultCode`/`faultString` members; missing members
/// leave code `0` and an empty message.
pub fn detect_fault(body: &str) -> Option<Fault> {
    if !body.contains(FAULT_MARKER) {
        return None;
    }

    let code = member_value(body, "faultCode")
        .and_then(|value| value.as_i64())
        .unwrap_or(0);
    let message = member_value(body, "faultString")
        .map(|value| value.to_string())
        .unwrap_or_default();

    Some(Fault::new(code, message))
}

fn member_value(body: &str, name: &str) -> Option<Value> {
    let marker = format!("<name>{}</name>", name);
    let at = body.find(&marker)?;
    let node = ValueNodes::new(&body[at + marker.len()..]).next()?;
    node.decode().ok()
}
