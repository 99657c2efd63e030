//! XML-RPC argument and result types
//!
//! This module defines the scalar data that crosses the wire in both
//! directions:
//!
//! - **Param**: a typed, render-ready argument placed inside a request
//! - **Arg**: a caller-supplied value before it becomes a `Param`
//! - **Value**: a scalar decoded from a response document
//!
//! # Type Inference
//!
//! The daemon's strict transport cares about the value tag of every
//! argument, so a `Param` always carries one of three kinds:
//!
//! - an integer that fits in 32 bits becomes `i4`
//! - a floating-point value becomes `i8` (the 8-byte integer tag is used for
//!   sizes and rates that callers compute as floats)
//! - everything else, including integers outside the 32-bit range, becomes
//!   `string`
//!
//! # Examples
//!
//! ```rust
//! use rtrpc_core::{Param, ParamKind};
//!
//! assert_eq!(Param::new(42).kind(), ParamKind::I4);
//! assert_eq!(Param::new(1.5e10).rendered(), "15000000000");
//! assert_eq!(Param::new("a<b").rendered(), "a&lt;b");
//! ```

use crate::codec::escape_text;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest integer that infers the 4-byte tag
pub const I4_MIN: i64 = i32::MIN as i64;

/// Largest integer that infers the 4-byte tag
pub const I4_MAX: i64 = i32::MAX as i64;

/// Wire value tag of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// 4-byte integer (`<i4>`)
    I4,
    /// 8-byte integer (`<i8>`)
    I8,
    /// String (`<string>`)
    String,
}

impl ParamKind {
    /// XML element name used for this kind
    pub fn tag(self) -> &'static str {
        match self {
            ParamKind::I4 => "i4",
            ParamKind::I8 => "i8",
            ParamKind::String => "string",
        }
    }

    /// Whether this kind renders as a bare decimal integer
    pub fn is_integer(self) -> bool {
        matches!(self, ParamKind::I4 | ParamKind::I8)
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A caller-supplied argument before rendering
///
/// Conversions exist for the common integer, float and string types, so
/// most call sites pass plain values and let `Param::new` infer the tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Integral value
    Int(i64),
    /// Floating-point value
    Float(f64),
    /// Text value
    Str(String),
}

impl Arg {
    /// Infer the wire kind for this argument
    pub fn infer_kind(&self) -> ParamKind {
        match self {
            Arg::Int(v) if (I4_MIN..=I4_MAX).contains(v) => ParamKind::I4,
            Arg::Float(_) => ParamKind::I8,
            _ => ParamKind::String,
        }
    }

    fn render_integer(&self) -> String {
        match self {
            Arg::Int(v) => v.to_string(),
            Arg::Float(v) => render_float(*v),
            Arg::Str(s) => s.trim().parse::<f64>().map(render_float).unwrap_or_else(|_| "0".into()),
        }
    }

    fn render_text(&self) -> String {
        match self {
            Arg::Int(v) => v.to_string(),
            Arg::Float(v) => v.to_string(),
            Arg::Str(s) => escape_text(s),
        }
    }
}

/// Round half away from zero and print without decimals or grouping
fn render_float(v: f64) -> String {
    if !v.is_finite() {
        return "0".to_string();
    }
    let rounded = v.round();
    if rounded == 0.0 {
        "0".to_string()
    } else {
        format!("{:.0}", rounded)
    }
}

impl From<i32> for Arg {
    fn from(v: i32) -> Self {
        Arg::Int(v.into())
    }
}

impl From<u32> for Arg {
    fn from(v: u32) -> Self {
        Arg::Int(v.into())
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Arg::Int(v)
    }
}

impl From<u64> for Arg {
    /// Values above `i64::MAX` have no integer representation on the wire
    /// and are sent as decimal strings.
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or_else(|_| Arg::Str(v.to_string()), Arg::Int)
    }
}

impl From<usize> for Arg {
    fn from(v: usize) -> Self {
        Arg::from(v as u64)
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Float(v)
    }
}

impl From<f32> for Arg {
    fn from(v: f32) -> Self {
        Arg::Float(v.into())
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Str(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Str(v)
    }
}

impl From<&String> for Arg {
    fn from(v: &String) -> Self {
        Arg::Str(v.clone())
    }
}

/// A typed, render-ready RPC argument
///
/// Immutable once constructed. `rendered` is exactly the text placed
/// between the value tags on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Param {
    kind: ParamKind,
    rendered: String,
}

impl Param {
    /// Create a parameter, inferring its kind from the value
    pub fn new(value: impl Into<Arg>) -> Self {
        let arg = value.into();
        let kind = arg.infer_kind();
        Self::from_arg(kind, &arg)
    }

    /// Create a parameter with an explicit kind
    pub fn with_kind(kind: ParamKind, value: impl Into<Arg>) -> Self {
        Self::from_arg(kind, &value.into())
    }

    /// Create a string parameter
    pub fn string(value: impl Into<String>) -> Self {
        Self::with_kind(ParamKind::String, Arg::Str(value.into()))
    }

    /// The empty-string target parameter
    pub fn empty_target() -> Self {
        Self {
            kind: ParamKind::String,
            rendered: String::new(),
        }
    }

    fn from_arg(kind: ParamKind, arg: &Arg) -> Self {
        let rendered = if kind.is_integer() {
            arg.render_integer()
        } else {
            arg.render_text()
        };
        Self { kind, rendered }
    }

    /// Wire kind of this parameter
    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    /// Escaped text placed inside the value tag
    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    /// Whether the parameter is string-typed
    pub fn is_string(&self) -> bool {
        self.kind == ParamKind::String
    }

    /// Whether the rendered value is the empty string
    pub fn is_empty_value(&self) -> bool {
        self.rendered.is_empty()
    }
}

/// A scalar decoded from a response document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Payload of an integer-tagged node
    Integer(i64),
    /// Payload of a string-tagged node, entity-decoded
    String(String),
}

impl Value {
    /// String payload, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Integer(_) => None,
        }
    }

    /// Integer view of the value
    ///
    /// String values are parsed, since several daemon getters report
    /// numbers as strings.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::String(s) => s.trim().parse().ok(),
        }
    }

    /// Whether the value came from an integer-tagged node
    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
