//! Request orchestration
//!
//! A [`Request`] owns a queue of commands and drives them to the daemon:
//!
//! 1. **Resolve**: translate every queued name through the settings provider
//! 2. **Patch**: apply the provider's whole-request rewrite hook
//! 3. **Expand**: replace `trk`/`stg` pseudo-commands in place
//! 4. **Batch**: pack the queue into documents under the size bound
//! 5. **Send**: deliver each document and wait for the raw response
//! 6. **Parse**: decode values with the selected strategy, check for faults
//!
//! The loop stops at the first transport failure, parse failure or fault.
//! Values decoded from earlier batches of the same run are kept.
//!
//! # Run Contract
//!
//! [`Request::run`] and [`Request::success`] report a plain boolean. The
//! reason behind a `false` is available afterwards through
//! [`Request::outcome`], [`Request::last_error`] and
//! [`Request::fault_detail`]. The queue is consumed by a run; a request is
//! single-use per logical batch.
//!
//! # Examples
//!
//! ```rust,no_run
//! use rtrpc_client::{Command, RtClient};
//!
//! # fn example() -> rtrpc_core::Result<()> {
//! let client = RtClient::connect("127.0.0.1:5000")?;
//!
//! let mut request = client
//!     .request()
//!     .command(Command::with_args("d.get_name", ["0123ABCD"]))
//!     .command(Command::with_args("d.get_size_bytes", ["0123ABCD"]));
//!
//! if request.success(true) {
//!     for value in request.results() {
//!         println!("{}", value);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::batch::{Batch, BatchBuilder};
use crate::call_log::CallLog;
use crate::command::Command;
use crate::expand::expand_legacy;
use crate::metrics::RpcMetrics;
use crate::settings::SettingsProvider;
use crate::transport::Transport;
use rtrpc_core::scan::{ParseMode, ParsedResponse};
use rtrpc_core::{Arg, Error, Fault, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Terminal state of a request run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every batch was sent and parsed without a fault
    Drained,
    /// The daemon reported a fault
    Faulted,
    /// A batch could not be delivered or got no response
    TransportFailed,
    /// A response did not contain the expected value nodes
    ParseFailed,
}

impl RunOutcome {
    /// Whether the run completed without any failure
    pub fn is_success(self) -> bool {
        self == RunOutcome::Drained
    }

    /// Short stable label used in logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Drained => "drained",
            RunOutcome::Faulted => "faulted",
            RunOutcome::TransportFailed => "transport_failed",
            RunOutcome::ParseFailed => "parse_failed",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queue of commands plus the state of its last run
pub struct Request {
    settings: Arc<dyn SettingsProvider>,
    transport: Arc<dyn Transport>,
    fault_log: Option<Arc<dyn CallLog>>,
    metrics: Option<Arc<RpcMetrics>>,
    commands: Vec<Command>,
    parse_mode: ParseMode,
    important: bool,
    results: Vec<Value>,
    strings: Vec<String>,
    integers: Vec<i64>,
    fault: bool,
    fault_detail: Option<Fault>,
    last_error: Option<Error>,
    outcome: Option<RunOutcome>,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("commands", &self.commands.len())
            .field("parse_mode", &self.parse_mode)
            .field("important", &self.important)
            .field("fault", &self.fault)
            .field("outcome", &self.outcome)
            .finish()
    }
}

impl Request {
    /// Create an empty request
    pub fn new(settings: Arc<dyn SettingsProvider>, transport: Arc<dyn Transport>) -> Self {
        Self {
            settings,
            transport,
            fault_log: None,
            metrics: None,
            commands: Vec::new(),
            parse_mode: ParseMode::Generic,
            important: true,
            results: Vec::new(),
            strings: Vec::new(),
            integers: Vec::new(),
            fault: false,
            fault_detail: None,
            last_error: None,
            outcome: None,
        }
    }

    /// Record the document and response of faulted batches
    ///
    /// Only applies to important requests.
    pub fn with_fault_log(mut self, log: Arc<dyn CallLog>) -> Self {
        self.fault_log = Some(log);
        self
    }

    /// Record runs and batches on these instruments
    pub fn with_metrics(mut self, metrics: Arc<RpcMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Queue a command, builder style
    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Queue several commands, builder style
    pub fn with_commands<I: IntoIterator<Item = Command>>(mut self, commands: I) -> Self {
        self.commands.extend(commands);
        self
    }

    /// Queue a command
    pub fn add_command(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    /// Append parameters to the most recently queued command
    ///
    /// Does nothing when the queue is empty.
    pub fn add_parameters<I>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        if let Some(last) = self.commands.last_mut() {
            last.add_parameters(values);
        }
        self
    }

    /// Number of queued commands
    pub fn commands_count(&self) -> usize {
        self.commands.len()
    }

    /// Queued commands
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Mark the request as important or not
    ///
    /// Faults of unimportant requests are expected races (for example a
    /// torrent removed while being queried) and are logged at debug level
    /// only.
    pub fn set_important(&mut self, important: bool) -> &mut Self {
        self.important = important;
        self
    }

    /// Builder-style [`Request::set_important`]
    pub fn important(mut self, important: bool) -> Self {
        self.important = important;
        self
    }

    /// Whether faults are logged loudly
    pub fn is_important(&self) -> bool {
        self.important
    }

    /// Collect strings and integers into separate lists
    pub fn set_parse_by_types(&mut self, enable: bool) -> &mut Self {
        self.parse_mode = if enable {
            ParseMode::Typed
        } else {
            ParseMode::Generic
        };
        self
    }

    /// Select the response decoding strategy
    pub fn parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = mode;
        self
    }

    /// Run the queue; true when every batch was delivered, parsed and fault-free
    #[tracing::instrument(skip(self), fields(commands = self.commands.len(), mode = ?self.parse_mode))]
    pub fn run(&mut self, trusted: bool) -> bool {
        self.reset();
        let started = Instant::now();

        let mut queue = self.prepare_queue();
        let outcome = self.drive(&mut queue, trusted);

        self.outcome = Some(outcome);
        if let Some(metrics) = &self.metrics {
            metrics.record_run(outcome.as_str(), started.elapsed().as_secs_f64());
        }
        tracing::debug!(
            outcome = %outcome,
            values = self.results.len() + self.strings.len() + self.integers.len(),
            "Request run finished"
        );

        outcome.is_success()
    }

    /// Run and additionally require that no fault was reported
    pub fn success(&mut self, trusted: bool) -> bool {
        self.run(trusted) && !self.fault
    }

    fn reset(&mut self) {
        self.results.clear();
        self.strings.clear();
        self.integers.clear();
        self.fault = false;
        self.fault_detail = None;
        self.last_error = None;
        self.outcome = None;
    }

    fn prepare_queue(&mut self) -> Vec<Command> {
        let settings = self.settings.as_ref();
        let mut queue = std::mem::take(&mut self.commands);

        for command in queue.iter_mut() {
            command.resolve_with(settings);
        }
        settings.patch_deprecated_request(&mut queue);
        expand_legacy(settings, queue)
    }

    fn drive(&mut self, queue: &mut [Command], trusted: bool) -> RunOutcome {
        let max_content_size = self.settings.max_content_size();

        for batch in BatchBuilder::new(queue, max_content_size) {
            tracing::debug!(
                commands = batch.len(),
                bytes = batch.document.len(),
                multicall = batch.multicall,
                "Sending batch"
            );

            let sent = Instant::now();
            let response = self.transport.send(&batch.document, trusted);
            if let Some(metrics) = &self.metrics {
                metrics.record_batch(
                    batch.len() as u64,
                    batch.document.len() as u64,
                    batch.multicall,
                    sent.elapsed().as_secs_f64(),
                );
            }

            let response = match response {
                Ok(response) => response,
                Err(e) => return self.fail(RunOutcome::TransportFailed, e),
            };

            let parsed = match self.parse_mode.parser().parse(&response) {
                Ok(parsed) => parsed,
                Err(e) => return self.fail(RunOutcome::ParseFailed, e),
            };

            if let Some(fault) = self.absorb(parsed) {
                self.report_fault(&batch, &response, &fault);
                self.fault = true;
                self.fault_detail = Some(fault.clone());
                self.last_error = Some(Error::Fault(fault));
                return RunOutcome::Faulted;
            }
        }

        RunOutcome::Drained
    }

    fn absorb(&mut self, parsed: ParsedResponse) -> Option<Fault> {
        self.results.extend(parsed.values);
        self.strings.extend(parsed.strings);
        self.integers.extend(parsed.integers);
        parsed.fault
    }

    fn fail(&mut self, outcome: RunOutcome, error: Error) -> RunOutcome {
        tracing::warn!(outcome = %outcome, error = %error, "Request batch failed");
        if let Some(metrics) = &self.metrics {
            metrics.record_error(error.kind());
        }
        self.last_error = Some(error);
        outcome
    }

    fn report_fault(&self, batch: &Batch, response: &str, fault: &Fault) {
        if let Some(metrics) = &self.metrics {
            metrics.record_fault(fault.code);
        }

        if !self.important {
            tracing::debug!(code = fault.code, message = %fault.message, "RPC fault on unimportant request");
            return;
        }

        tracing::warn!(
            code = fault.code,
            message = %fault.message,
            commands = batch.len(),
            "RPC fault"
        );
        if let Some(log) = &self.fault_log {
            log.record(&batch.document);
            log.record(response);
        }
    }

    /// Whether the daemon reported a fault in the last run
    pub fn fault(&self) -> bool {
        self.fault
    }

    /// Code and message of the fault, if one was reported
    pub fn fault_detail(&self) -> Option<&Fault> {
        self.fault_detail.as_ref()
    }

    /// Cause of the last failed run
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Terminal state of the last run, `None` before the first run
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome
    }

    /// Values decoded in generic mode, in document order
    pub fn results(&self) -> &[Value] {
        &self.results
    }

    /// String values decoded in typed mode
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Integer values decoded in typed mode
    pub fn integers(&self) -> &[i64] {
        &self.integers
    }

    /// Generic-mode values chunked into rows of `width`
    ///
    /// A trailing partial row is kept. Width zero yields no rows.
    pub fn rows(&self, width: usize) -> Vec<&[Value]> {
        if width == 0 {
            return Vec::new();
        }
        self.results.chunks(width).collect()
    }

    /// Take the generic-mode values out of the request
    pub fn take_results(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.results)
    }

    /// Error describing why the last run did not succeed
    pub fn failure(&self) -> Error {
        match (&self.last_error, self.outcome) {
            (Some(error), _) => error.clone(),
            (None, None) => Error::Internal("request has not been run".into()),
            (None, Some(outcome)) => Error::Internal(format!("request ended as {}", outcome)),
        }
    }
}
