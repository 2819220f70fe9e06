//! Handler counters
//!
//! - Counters only, monotonic
//! - Reset only on process start
//! - Thread-safe but lock-minimal

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for the handler subsystem.
///
/// All counters use Relaxed atomics; exactness per counter, no cross-counter
/// consistency.
#[derive(Debug, Default)]
pub struct HandlerMetrics {
    handles_opened: AtomicU64,
    handles_reopened: AtomicU64,
    open_failures: AtomicU64,
    handles_closed: AtomicU64,
    handles_invalidated: AtomicU64,
    handles_removed: AtomicU64,
    reads: AtomicU64,
    rows_returned: AtomicU64,
    deleted_records_skipped: AtomicU64,
    reopen_retries: AtomicU64,
    refresh_broadcasts: AtomicU64,
}

impl HandlerMetrics {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_opened(&self) {
        self.handles_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reopened(&self) {
        self.handles_reopened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_open_failures(&self) {
        self.open_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_closed(&self) {
        self.handles_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_invalidated(&self) {
        self.handles_invalidated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_removed(&self) {
        self.handles_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reads(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rows_returned(&self) {
        self.rows_returned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deleted_skipped(&self) {
        self.deleted_records_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reopen_retries(&self) {
        self.reopen_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_refresh_broadcasts(&self) {
        self.refresh_broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            handles_opened: self.handles_opened.load(Ordering::Relaxed),
            handles_reopened: self.handles_reopened.load(Ordering::Relaxed),
            open_failures: self.open_failures.load(Ordering::Relaxed),
            handles_closed: self.handles_closed.load(Ordering::Relaxed),
            handles_invalidated: self.handles_invalidated.load(Ordering::Relaxed),
            handles_removed: self.handles_removed.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            rows_returned: self.rows_returned.load(Ordering::Relaxed),
            deleted_records_skipped: self.deleted_records_skipped.load(Ordering::Relaxed),
            reopen_retries: self.reopen_retries.load(Ordering::Relaxed),
            refresh_broadcasts: self.refresh_broadcasts.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub handles_opened: u64,
    pub handles_reopened: u64,
    pub open_failures: u64,
    pub handles_closed: u64,
    pub handles_invalidated: u64,
    pub handles_removed: u64,
    pub reads: u64,
    pub rows_returned: u64,
    pub deleted_records_skipped: u64,
    pub reopen_retries: u64,
    pub refresh_broadcasts: u64,
}
