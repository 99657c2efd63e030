//! RPC commands and target-parameter normalization
//!
//! A [`Command`] is a method name plus its ordered parameters. Before it is
//! serialized, [`Command::ensure_target_parameter`] makes the parameter list
//! acceptable to the daemon's strict XML transport.
//!
//! # Target Parameters
//!
//! The strict transport treats the first argument of every call as a
//! target (a torrent hash, or the empty string for "no target"). The older
//! permissive transport did not, and callers written against it omit the
//! target. Normalization compensates:
//!
//! - `d.multicall*` always starts with an empty target
//! - target-scoped methods (`d.`, `t.`, `p.`, `f.`, `ratio.`, `to_`,
//!   `branch`) get an empty target unless the first argument is a string
//! - global methods with arguments get an empty target unless the first
//!   argument already is one
//!
//! Every branch only inserts when the current first parameter does not
//! already satisfy it, so normalization is idempotent.
//!
//! # Examples
//!
//! ```rust
//! use rtrpc_client::Command;
//!
//! let mut cmd = Command::with_args("d.get_name", ["0123ABCD"]);
//! cmd.ensure_target_parameter();
//! assert_eq!(cmd.params().len(), 1);
//!
//! let mut cmd = Command::with_args("throttle.global_down.max_rate.set", [1024]);
//! cmd.ensure_target_parameter();
//! assert_eq!(cmd.params().len(), 2);
//! assert!(cmd.params()[0].is_empty_value());
//! ```

use crate::settings::{SettingsProvider, PROBE_COMMAND};
use rtrpc_core::{Arg, Param, ParamKind};
use std::fmt;

/// Method-name prefix of the download multicall family
pub const MULTICALL_PREFIX: &str = "d.multicall";

const TARGET_SCOPES: [&str; 6] = ["d.", "t.", "p.", "f.", "ratio.", "to_"];

/// Whether a method addresses a target by its first argument
pub fn needs_target(method: &str) -> bool {
    TARGET_SCOPES.iter().any(|scope| method.starts_with(scope))
        || method == "branch"
        || method == "branch="
}

/// A method name plus ordered parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    method: String,
    params: Vec<Param>,
    resolved: bool,
}

impl Command {
    /// Create a command without parameters
    ///
    /// The name is translated by the request's settings provider when the
    /// request runs.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: Vec::new(),
            resolved: false,
        }
    }

    /// Create a command with inferred-kind parameters
    pub fn with_args<I>(method: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        let mut command = Self::new(method);
        command.add_parameters(args);
        command
    }

    /// Create a command whose name is translated immediately
    ///
    /// The deprecated-command hook runs before `args` are appended, so a
    /// hook that injects a leading target puts it ahead of them.
    pub fn resolved<I>(settings: &dyn SettingsProvider, method: &str, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        let mut command = Self {
            method: settings.resolve(method),
            params: Vec::new(),
            resolved: true,
        };
        settings.patch_deprecated_command(&mut command, method);
        command.add_parameters(args);
        command
    }

    /// Build `<scope>.multicall` over a list of getters
    ///
    /// Parameters are the target, an empty secondary target, then every
    /// getter name translated by `settings` and sent as a string. The
    /// download scope takes a view name instead and has no secondary target.
    pub fn multicall<S: AsRef<str>>(
        settings: &dyn SettingsProvider,
        scope: &str,
        target: &str,
        getters: &[S],
    ) -> Self {
        let method = format!("{}.multicall", scope);
        let mut command = if scope == "d" {
            Self::resolved(settings, &method, [target])
        } else {
            Self::resolved(settings, &method, [target, ""])
        };
        for getter in getters {
            command.add_typed_parameter(ParamKind::String, settings.resolve(getter.as_ref()));
        }
        command
    }

    /// The neutral probe command
    pub fn probe() -> Self {
        Self {
            method: PROBE_COMMAND.to_string(),
            params: Vec::new(),
            resolved: true,
        }
    }

    /// Method name as it will be sent
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Parameters in call order
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Whether the name has already been translated
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Replace the method name
    pub fn set_method(&mut self, method: impl Into<String>) {
        self.method = method.into();
    }

    /// Append a parameter, inferring its kind
    pub fn add_parameter(&mut self, value: impl Into<Arg>) -> &mut Self {
        self.params.push(Param::new(value));
        self
    }

    /// Append a parameter with an explicit kind
    pub fn add_typed_parameter(&mut self, kind: ParamKind, value: impl Into<Arg>) -> &mut Self {
        self.params.push(Param::with_kind(kind, value));
        self
    }

    /// Append several parameters, inferring their kinds
    pub fn add_parameters<I>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        self.params.extend(values.into_iter().map(Param::new));
        self
    }

    /// Append an already built parameter
    pub fn push_param(&mut self, param: Param) -> &mut Self {
        self.params.push(param);
        self
    }

    /// Insert a parameter at `index`
    pub fn insert_parameter(&mut self, index: usize, param: Param) {
        let index = index.min(self.params.len());
        self.params.insert(index, param);
    }

    /// Replace every parameter
    pub fn set_params(&mut self, params: Vec<Param>) {
        self.params = params;
    }

    /// Translate the name through `settings` unless already done
    pub(crate) fn resolve_with(&mut self, settings: &dyn SettingsProvider) {
        if self.resolved {
            return;
        }
        let original = std::mem::take(&mut self.method);
        self.method = settings.resolve(&original);
        self.resolved = true;
        settings.patch_deprecated_command(self, &original);
    }

    /// Make the parameter list acceptable to the strict transport
    pub fn ensure_target_parameter(&mut self) {
        let first = self.params.first();
        let first_is_empty = first.map_or(false, Param::is_empty_value);

        if self.method.starts_with(MULTICALL_PREFIX) {
            if !first_is_empty {
                self.prepend_empty_target();
            }
            return;
        }

        if !needs_target(&self.method) {
            // the strict transport consumes the first argument as a target
            if first.is_none() || first_is_empty {
                return;
            }
            self.prepend_empty_target();
            return;
        }

        if first.map_or(false, Param::is_string) {
            return;
        }
        self.prepend_empty_target();
    }

    fn prepend_empty_target(&mut self) {
        self.params.insert(0, Param::empty_target());
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.method)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}:{}", param.kind(), param.rendered())?;
        }
        f.write_str(")")
    }
}
