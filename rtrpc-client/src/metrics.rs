//! Client metrics definitions
//!
//! OpenTelemetry instruments describing how the engine talks to the
//! daemon. They are recorded only when the client was built with
//! observability enabled.
//!
//! # Metrics Collected
//!
//! - **rtrpc.client.runs.total**: request runs by outcome (counter)
//! - **rtrpc.client.run.duration**: wall time of a whole run (histogram)
//! - **rtrpc.client.batches.total**: documents sent (counter)
//! - **rtrpc.client.batch.commands**: commands per document (histogram)
//! - **rtrpc.client.batch.bytes**: document size in bytes (histogram)
//! - **rtrpc.client.batch.duration**: SCGI round-trip time (histogram)
//! - **rtrpc.client.faults.total**: RPC faults reported by the daemon (counter)
//! - **rtrpc.client.errors.total**: transport and parse failures (counter)
//!
//! # Examples
//!
//! ```rust,no_run
//! use rtrpc_client::RpcMetrics;
//!
//! let metrics = RpcMetrics::new("torrent-dashboard");
//! metrics.record_batch(12, 4096, true, 0.004);
//! ```

use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
    InstrumentationScope, KeyValue,
};

/// OpenTelemetry instruments for the RPC engine
pub struct RpcMetrics {
    /// Request runs by outcome
    pub runs_total: Counter<u64>,
    /// Run duration in seconds
    pub run_duration: Histogram<f64>,
    /// Documents sent to the daemon
    pub batches_total: Counter<u64>,
    /// Commands carried per document
    pub batch_commands: Histogram<u64>,
    /// Document size in bytes
    pub batch_bytes: Histogram<u64>,
    /// Round-trip time per document in seconds
    pub batch_duration: Histogram<f64>,
    /// Faults reported by the daemon
    pub faults_total: Counter<u64>,
    /// Transport and parse failures
    pub errors_total: Counter<u64>,
}

impl std::fmt::Debug for RpcMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcMetrics").finish_non_exhaustive()
    }
}

impl RpcMetrics {
    /// Create the instruments on the global meter provider
    pub fn new(service_name: impl Into<String>) -> Self {
        let scope = InstrumentationScope::builder(service_name.into()).build();
        let meter = global::meter_with_scope(scope);
        Self::new_with_meter(&meter)
    }

    /// Create the instruments on a specific meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            runs_total: meter
                .u64_counter("rtrpc.client.runs.total")
                .with_description("Request runs by outcome")
                .build(),
            run_duration: meter
                .f64_histogram("rtrpc.client.run.duration")
                .with_description("Request run duration in seconds")
                .build(),
            batches_total: meter
                .u64_counter("rtrpc.client.batches.total")
                .with_description("Documents sent to the daemon")
                .build(),
            batch_commands: meter
                .u64_histogram("rtrpc.client.batch.commands")
                .with_description("Commands carried per document")
                .build(),
            batch_bytes: meter
                .u64_histogram("rtrpc.client.batch.bytes")
                .with_description("Serialized document size in bytes")
                .build(),
            batch_duration: meter
                .f64_histogram("rtrpc.client.batch.duration")
                .with_description("SCGI round-trip time in seconds")
                .build(),
            faults_total: meter
                .u64_counter("rtrpc.client.faults.total")
                .with_description("RPC faults reported by the daemon")
                .build(),
            errors_total: meter
                .u64_counter("rtrpc.client.errors.total")
                .with_description("Transport and parse failures")
                .build(),
        }
    }

    /// Record a finished run
    pub fn record_run(&self, outcome: &str, duration_secs: f64) {
        let attributes = &[KeyValue::new("outcome", outcome.to_string())];
        self.runs_total.add(1, attributes);
        self.run_duration.record(duration_secs, attributes);
    }

    /// Record one document exchange
    pub fn record_batch(&self, commands: u64, bytes: u64, multicall: bool, duration_secs: f64) {
        let attributes = &[KeyValue::new("multicall", multicall)];
        self.batches_total.add(1, attributes);
        self.batch_commands.record(commands, attributes);
        self.batch_bytes.record(bytes, attributes);
        self.batch_duration.record(duration_secs, attributes);
    }

    /// Record a fault
    pub fn record_fault(&self, code: i64) {
        self.faults_total.add(1, &[KeyValue::new("code", code)]);
    }

    /// Record a transport or parse failure
    pub fn record_error(&self, error_type: &str) {
        let attributes = &[KeyValue::new("error_type", error_type.to_string())];
        self.errors_total.add(1, attributes);
    }
}
