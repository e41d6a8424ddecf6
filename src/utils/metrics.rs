//! Observability and Metrics
//!
//! In-process counters for gateway health. A [`Metrics`] instance is owned by
//! the session store and shared with the listeners through an `Arc`; there is
//! no process-wide instance.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector for gateway operations
#[derive(Debug)]
pub struct Metrics {
    /// Total sessions created
    pub sessions_total: AtomicU64,
    /// Currently registered sessions
    pub sessions_active: AtomicU64,
    /// Frames handed to the transport
    pub frames_sent: AtomicU64,
    /// Frames read from the transport
    pub frames_received: AtomicU64,
    /// Payload bytes written
    pub bytes_sent: AtomicU64,
    /// Payload bytes read
    pub bytes_received: AtomicU64,
    /// Sends rejected because the outbound queue was full
    pub backpressure_drops: AtomicU64,
    /// Sessions terminated by kick
    pub kicks: AtomicU64,
    /// Sessions dropped by the abuse-control guard
    pub guard_terminations: AtomicU64,
    /// Malformed frames received
    pub protocol_errors: AtomicU64,
    /// Panics recovered in dispatch
    pub handler_panics: AtomicU64,
    /// Transport read/write failures
    pub transport_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            sessions_total: AtomicU64::new(0),
            sessions_active: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            backpressure_drops: AtomicU64::new(0),
            kicks: AtomicU64::new(0),
            guard_terminations: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            handler_panics: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn session_opened(&self) {
        self.sessions_total.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        // Saturating: a session removed twice must not wrap the gauge
        let _ = self
            .sessions_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn frame_sent(&self, byte_count: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent
            .fetch_add(byte_count as u64, Ordering::Relaxed);
    }

    pub fn frame_received(&self, byte_count: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(byte_count as u64, Ordering::Relaxed);
    }

    pub fn backpressure_drop(&self) {
        self.backpressure_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn kick(&self) {
        self.kicks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn guard_termination(&self) {
        self.guard_terminations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_panic(&self) {
        self.handler_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_total: self.sessions_total.load(Ordering::Relaxed),
            sessions_active: self.sessions_active.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            backpressure_drops: self.backpressure_drops.load(Ordering::Relaxed),
            kicks: self.kicks.load(Ordering::Relaxed),
            guard_terminations: self.guard_terminations.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let s = self.snapshot();
        info!(
            sessions_total = s.sessions_total,
            sessions_active = s.sessions_active,
            frames_sent = s.frames_sent,
            frames_received = s.frames_received,
            bytes_sent = s.bytes_sent,
            bytes_received = s.bytes_received,
            backpressure_drops = s.backpressure_drops,
            kicks = s.kicks,
            guard_terminations = s.guard_terminations,
            protocol_errors = s.protocol_errors,
            handler_panics = s.handler_panics,
            transport_errors = s.transport_errors,
            uptime_seconds = s.uptime_seconds,
            "Gateway metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sessions_total: u64,
    pub sessions_active: u64,
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub backpressure_drops: u64,
    pub kicks: u64,
    pub guard_terminations: u64,
    pub protocol_errors: u64,
    pub handler_panics: u64,
    pub transport_errors: u64,
    pub uptime_seconds: u64,
}
