//! Writes aggregated increments to the counter store, one key at a time.

use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use super::error::{EngineError, ErrorReporter, LOC_WRITE};
use crate::interfaces::{Incrementer, StoreError};
use crate::schema::AggregatedRow;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WriteSummary {
    pub(crate) written: u64,
    pub(crate) failed: u64,
}

pub(crate) struct Writer {
    store: Arc<dyn Incrementer>,
    timeout: Duration,
}

impl Writer {
    pub(crate) fn new(store: Arc<dyn Incrementer>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Issue one increment per row, sequentially. The returned counter value
    /// is discarded; a failing key is reported and the next one is attempted.
    pub(crate) async fn write(&self, rows: Vec<AggregatedRow>, errors: &ErrorReporter) -> WriteSummary {
        let mut summary = WriteSummary::default();

        for row in rows {
            let key = row.destination();
            let result = tokio::time::timeout(self.timeout, self.store.increment(&row.to_row()))
                .await
                .unwrap_or(Err(StoreError::Timeout(self.timeout)));

            match result {
                Ok(value) => {
                    summary.written += 1;
                    trace!(key = %key, delta = row.delta, value = value, "Counter updated");
                }
                Err(source) => {
                    summary.failed += 1;
                    errors.report(LOC_WRITE, EngineError::Write { key, source });
                }
            }
        }

        summary
    }
}
