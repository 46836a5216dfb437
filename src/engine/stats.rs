//! Engine counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of what the engine has processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatcherStats {
    /// Rows taken off the inbound channel.
    pub rows_received: u64,
    /// Non-empty batches aggregated and written.
    pub batches_flushed: u64,
    /// Aggregated increments the store accepted.
    pub keys_written: u64,
    /// Aggregated increments that failed or timed out.
    pub write_failures: u64,
    /// Rows left out of a sum (bad delta or overflow).
    pub rejected_rows: u64,
    /// Timer ticks that found the batch still open.
    pub idle_ticks: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) rows_received: AtomicU64,
    pub(crate) batches_flushed: AtomicU64,
    pub(crate) keys_written: AtomicU64,
    pub(crate) write_failures: AtomicU64,
    pub(crate) rejected_rows: AtomicU64,
    pub(crate) idle_ticks: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn incr(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> BatcherStats {
        BatcherStats {
            rows_received: self.rows_received.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            keys_written: self.keys_written.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            rejected_rows: self.rejected_rows.load(Ordering::Relaxed),
            idle_ticks: self.idle_ticks.load(Ordering::Relaxed),
        }
    }
}
