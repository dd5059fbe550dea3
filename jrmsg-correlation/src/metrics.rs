//! Correlation metrics definitions
//!
//! OpenTelemetry instruments describing the lifecycle of pending requests.
//! They are recorded by [`crate::CorrelationRegistry`] when metrics are
//! attached, and exported by whatever meter provider the application has
//! installed (nothing is exported otherwise).
//!
//! # Metrics Collected
//!
//! - **registered**: entries created (counter)
//! - **delivered**: responses handed to a waiting callback (counter)
//! - **timed_out**: entries that expired first (counter)
//! - **removed**: entries cancelled explicitly (counter)
//! - **unmatched**: responses with no pending entry (counter)
//! - **pending**: entries currently waiting (up/down counter)
//! - **wait_duration**: time from registration to delivery or expiry (histogram)

use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter, UpDownCounter},
    KeyValue,
};
use std::time::Duration;

/// Correlation metrics for monitoring
pub struct CorrelationMetrics {
    /// Entries created
    pub registered: Counter<u64>,
    /// Responses delivered to a waiting callback
    pub delivered: Counter<u64>,
    /// Entries that expired before a response arrived
    pub timed_out: Counter<u64>,
    /// Entries removed explicitly
    pub removed: Counter<u64>,
    /// Responses that matched no pending entry
    pub unmatched: Counter<u64>,
    /// Entries currently waiting
    pub pending: UpDownCounter<i64>,
    /// Seconds between registration and settlement
    pub wait_duration: Histogram<f64>,
}

impl CorrelationMetrics {
    /// Create metrics on the global meter provider
    pub fn new() -> Self {
        let meter = global::meter("jrmsg-correlation");
        Self::new_with_meter(&meter)
    }

    /// Create metrics with a custom meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            registered: meter
                .u64_counter("jrmsg.correlation.registered")
                .with_description("Pending request entries created")
                .build(),
            delivered: meter
                .u64_counter("jrmsg.correlation.delivered")
                .with_description("Responses delivered to a waiting request")
                .build(),
            timed_out: meter
                .u64_counter("jrmsg.correlation.timed_out")
                .with_description("Pending requests that expired without a response")
                .build(),
            removed: meter
                .u64_counter("jrmsg.correlation.removed")
                .with_description("Pending requests cancelled explicitly")
                .build(),
            unmatched: meter
                .u64_counter("jrmsg.correlation.unmatched")
                .with_description("Responses that matched no pending request")
                .build(),
            pending: meter
                .i64_up_down_counter("jrmsg.correlation.pending")
                .with_description("Requests currently waiting for a response")
                .build(),
            wait_duration: meter
                .f64_histogram("jrmsg.correlation.wait_duration")
                .with_description("Seconds from registration to delivery or expiry")
                .build(),
        }
    }

    /// Record a new entry; `replaced` is true when it displaced an older one
    pub fn record_registered(&self, replaced: bool) {
        self.registered
            .add(1, &[KeyValue::new("replaced", replaced)]);
        if !replaced {
            self.pending.add(1, &[]);
        }
    }

    /// Record a delivery
    pub fn record_delivered(&self, waited: Duration) {
        self.delivered.add(1, &[]);
        self.pending.add(-1, &[]);
        self.wait_duration
            .record(waited.as_secs_f64(), &[KeyValue::new("outcome", "delivered")]);
    }

    /// Record an expiry
    pub fn record_timed_out(&self, waited: Duration) {
        self.timed_out.add(1, &[]);
        self.pending.add(-1, &[]);
        self.wait_duration
            .record(waited.as_secs_f64(), &[KeyValue::new("outcome", "timed_out")]);
    }

    /// Record an explicit removal
    pub fn record_removed(&self) {
        self.removed.add(1, &[]);
        self.pending.add(-1, &[]);
    }

    /// Record a response nobody was waiting for
    pub fn record_unmatched(&self) {
        self.unmatched.add(1, &[]);
    }
}

impl Default for CorrelationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CorrelationMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationMetrics").finish_non_exhaustive()
    }
}
