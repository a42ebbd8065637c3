//! Per-connection call metrics.
//!
//! Each [`crate::RpcClient`] owns one [`RpcMetrics`] registry, created on
//! connect and dropped with the connection. Every counter is also mirrored
//! to the process-wide `metrics` facade, which is a no-op unless the host
//! application installs a recorder.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

// ============================================================================
// Metric Names
// ============================================================================

/// Metric names emitted through the `metrics` facade.
pub mod names {
    /// Total number of calls issued.
    pub const CALLS_TOTAL: &str = "devtools_rpc_calls_total";
    /// Calls that ended with a remote error.
    pub const CALL_FAILURES_TOTAL: &str = "devtools_rpc_call_failures_total";
    /// Calls that ran out of time.
    pub const CALL_TIMEOUTS_TOTAL: &str = "devtools_rpc_call_timeouts_total";
    /// Calls that failed at the transport level.
    pub const TRANSPORT_ERRORS_TOTAL: &str = "devtools_rpc_transport_errors_total";
    /// Duration of completed calls in seconds.
    pub const CALL_DURATION_SECONDS: &str = "devtools_rpc_call_duration_seconds";
    /// Event notifications delivered to at least one listener.
    pub const EVENTS_DISPATCHED_TOTAL: &str = "devtools_rpc_events_dispatched_total";
    /// Inbound frames dropped (malformed or late).
    pub const FRAMES_DROPPED_TOTAL: &str = "devtools_rpc_frames_dropped_total";
}

// ============================================================================
// RpcMetrics
// ============================================================================

/// Counter registry owned by one connection.
#[derive(Debug, Default)]
pub struct RpcMetrics {
    calls_started: AtomicU64,
    calls_succeeded: AtomicU64,
    rpc_failures: AtomicU64,
    timeouts: AtomicU64,
    transport_errors: AtomicU64,
    cancelled: AtomicU64,
    call_duration_micros: AtomicU64,
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    events_dispatched: AtomicU64,
    listener_panics: AtomicU64,
}

impl RpcMetrics {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls_started: self.calls_started.load(Ordering::Relaxed),
            calls_succeeded: self.calls_succeeded.load(Ordering::Relaxed),
            rpc_failures: self.rpc_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            call_duration_micros: self.call_duration_micros.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            listener_panics: self.listener_panics.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn call_started(&self, domain: &str) {
        self.calls_started.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!(names::CALLS_TOTAL, "domain" => domain.to_owned()).increment(1);
    }

    pub(crate) fn call_succeeded(&self, elapsed: Duration) {
        self.calls_succeeded.fetch_add(1, Ordering::Relaxed);
        self.record_duration(elapsed);
    }

    pub(crate) fn rpc_failure(&self, domain: &str, elapsed: Duration) {
        self.rpc_failures.fetch_add(1, Ordering::Relaxed);
        self.record_duration(elapsed);
        ::metrics::counter!(names::CALL_FAILURES_TOTAL, "domain" => domain.to_owned()).increment(1);
    }

    pub(crate) fn timeout(&self, domain: &str) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!(names::CALL_TIMEOUTS_TOTAL, "domain" => domain.to_owned()).increment(1);
    }

    pub(crate) fn transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!(names::TRANSPORT_ERRORS_TOTAL).increment(1);
    }

    pub(crate) fn cancelled(&self, count: usize) {
        self.cancelled.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!(names::FRAMES_DROPPED_TOTAL).increment(1);
    }

    pub(crate) fn event_dispatched(&self) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!(names::EVENTS_DISPATCHED_TOTAL).increment(1);
    }

    pub(crate) fn listener_panicked(&self) {
        self.listener_panics.fetch_add(1, Ordering::Relaxed);
    }

    fn record_duration(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.call_duration_micros
            .fetch_add(micros, Ordering::Relaxed);
        ::metrics::histogram!(names::CALL_DURATION_SECONDS).record(elapsed.as_secs_f64());
    }
}

// ============================================================================
// MetricsSnapshot
// ============================================================================

/// Point-in-time values of an [`RpcMetrics`] registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Calls issued.
    pub calls_started: u64,
    /// Calls that returned a success payload.
    pub calls_succeeded: u64,
    /// Calls the remote end rejected.
    pub rpc_failures: u64,
    /// Calls that ran out of time.
    pub timeouts: u64,
    /// Calls that failed to send.
    pub transport_errors: u64,
    /// Calls force-failed on close.
    pub cancelled: u64,
    /// Sum of completed call durations, in microseconds.
    pub call_duration_micros: u64,
    /// Inbound frames handed to the dispatcher.
    pub frames_received: u64,
    /// Inbound frames dropped (malformed or late).
    pub frames_dropped: u64,
    /// Events delivered to listeners.
    pub events_dispatched: u64,
    /// Listener invocations that panicked.
    pub listener_panics: u64,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = RpcMetrics::new();
        metrics.call_started("Page");
        metrics.call_started("Page");
        metrics.call_succeeded(Duration::from_millis(3));
        metrics.rpc_failure("Page", Duration::from_millis(2));
        metrics.timeout("Page");
        metrics.cancelled(4);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.calls_started, 2);
        assert_eq!(snapshot.calls_succeeded, 1);
        assert_eq!(snapshot.rpc_failures, 1);
        assert_eq!(snapshot.timeouts, 1);
        assert_eq!(snapshot.cancelled, 4);
        assert_eq!(snapshot.call_duration_micros, 5_000);
    }

    #[test]
    fn test_registries_are_independent() {
        let a = RpcMetrics::new();
        let b = RpcMetrics::new();
        a.frame_dropped();
        assert_eq!(a.snapshot().frames_dropped, 1);
        assert_eq!(b.snapshot(), MetricsSnapshot::default());
    }
}
