//! Batching engine for counter increments.
//!
//! ```text
//! producers ──> RowSender ──> collector ──> aggregate ──> writer ──> Incrementer
//!                  (bounded)     │ (sum per key)  (one call per key)
//!                                └──> ErrorHandler (parse / write / connect failures)
//! ```
//!
//! The collector runs on its own tokio task and owns the in-progress batch.
//! A batch is flushed when `batch_size` rows have arrived or when shutdown is
//! requested. The wait-time timer only wakes the collector; an idle tick
//! never flushes.
//!
//! Usage:
//! ```ignore
//! let batcher = CounterBatcher::with_store(EngineConfig::default(), store, on_error)?;
//! batcher.submit(Row::incr(schema.clone(), "A", "A", 5)).await?;
//! batcher.shutdown_and_wait().await;
//! ```

mod aggregate;
mod error;
mod stats;
mod writer;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

pub use aggregate::aggregate;
pub use error::{
    EngineError, ErrorHandler, LOC_CONNECT, LOC_OVERFLOW, LOC_PARSE, LOC_WRITE,
};
pub use stats::BatcherStats;

use crate::config::{EngineConfig, StorageConfig};
use crate::interfaces::{self, Incrementer, StoreError};
use crate::schema::Row;
use error::ErrorReporter;
use stats::StatsCounters;
use writer::Writer;

/// Lifecycle of a batcher. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Accepting and batching rows.
    Running,
    /// Shutdown requested; the final batch is being flushed.
    Draining,
    /// Collector task finished. Submissions fail with `EngineError::Stopped`.
    Stopped,
}

/// Cloneable submission handle for the inbound channel.
///
/// Sending waits while the channel is full, which is the only backpressure
/// producers get.
#[derive(Clone)]
pub struct RowSender {
    tx: mpsc::Sender<Row>,
}

impl RowSender {
    pub async fn send(&self, row: Row) -> Result<(), EngineError> {
        self.tx.send(row).await.map_err(|_| EngineError::Stopped)
    }

    /// Send from synchronous code. Must not be called from an async context.
    pub fn blocking_send(&self, row: Row) -> Result<(), EngineError> {
        self.tx.blocking_send(row).map_err(|_| EngineError::Stopped)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Handle to a running batcher.
///
/// Dropping the handle requests shutdown, same as calling [`shutdown`].
///
/// [`shutdown`]: CounterBatcher::shutdown
pub struct CounterBatcher {
    sender: RowSender,
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<EngineState>,
    stats: Arc<StatsCounters>,
}

impl CounterBatcher {
    /// Spawn the collector and return immediately.
    ///
    /// `connect` is awaited on the collector task. If it fails the error is
    /// reported at [`LOC_CONNECT`] and the batcher stops without accepting
    /// rows. Must be called from within a tokio runtime.
    pub fn start<F>(
        config: EngineConfig,
        connect: F,
        on_error: ErrorHandler,
    ) -> Result<Self, EngineError>
    where
        F: Future<Output = interfaces::Result<Arc<dyn Incrementer>>> + Send + 'static,
    {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(EngineState::Running);
        let stats = Arc::new(StatsCounters::default());

        info!(
            batch_size = config.batch_size,
            wait_time = ?config.wait_time(),
            channel_capacity = config.channel_capacity,
            "Counter batcher starting"
        );

        let collector = Collector {
            config,
            rows: rx,
            shutdown: shutdown_rx,
            state: Arc::new(state_tx),
            stats: Arc::clone(&stats),
            errors: ErrorReporter::new(on_error),
        };
        tokio::spawn(collector.run(connect));

        Ok(Self {
            sender: RowSender { tx },
            shutdown: shutdown_tx,
            state: state_rx,
            stats,
        })
    }

    /// Start against an already connected store.
    pub fn with_store(
        config: EngineConfig,
        store: Arc<dyn Incrementer>,
        on_error: ErrorHandler,
    ) -> Result<Self, EngineError> {
        Self::start(config, async move { Ok::<_, StoreError>(store) }, on_error)
    }

    /// Start against the store selected by `storage`, connecting on the
    /// collector task.
    pub fn with_storage(
        config: EngineConfig,
        storage: StorageConfig,
        on_error: ErrorHandler,
    ) -> Result<Self, EngineError> {
        Self::start(
            config,
            async move {
                let backend = crate::storage::connect(&storage).await?;
                Ok::<_, StoreError>(backend.incrementer())
            },
            on_error,
        )
    }

    pub fn sender(&self) -> RowSender {
        self.sender.clone()
    }

    pub async fn submit(&self, row: Row) -> Result<(), EngineError> {
        self.sender.send(row).await
    }

    /// Request a final flush and stop. Safe to call any number of times.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Wait until the collector has flushed its last batch and exited.
    pub async fn stopped(&self) {
        let mut state = self.state.clone();
        // Err means the collector task is gone, which is stopped too.
        let _ = state.wait_for(|s| *s == EngineState::Stopped).await;
    }

    pub async fn shutdown_and_wait(&self) {
        self.shutdown();
        self.stopped().await;
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> BatcherStats {
        self.stats.snapshot()
    }
}

/// Upper bound on the per-cycle batch reservation; larger batches grow on demand.
const MAX_PREALLOCATED_ROWS: usize = 1024;

enum Cycle {
    /// `batch_size` rows collected.
    Full(Vec<Row>),
    /// Shutdown requested or every sender dropped.
    Shutdown(Vec<Row>),
}

struct Collector {
    config: EngineConfig,
    rows: mpsc::Receiver<Row>,
    shutdown: watch::Receiver<bool>,
    state: Arc<watch::Sender<EngineState>>,
    stats: Arc<StatsCounters>,
    errors: ErrorReporter,
}

/// Publishes `Stopped` when the collector exits, including by unwinding.
struct StoppedOnDrop(Arc<watch::Sender<EngineState>>);

impl Drop for StoppedOnDrop {
    fn drop(&mut self) {
        self.0.send_replace(EngineState::Stopped);
    }
}

impl Collector {
    async fn run<F>(mut self, connect: F)
    where
        F: Future<Output = interfaces::Result<Arc<dyn Incrementer>>>,
    {
        let _stopped = StoppedOnDrop(Arc::clone(&self.state));

        let store = match connect.await {
            Ok(store) => store,
            Err(e) => {
                self.errors.report(LOC_CONNECT, EngineError::Connect(e));
                self.rows.close();
                let mut discarded = 0usize;
                while self.rows.try_recv().is_ok() {
                    discarded += 1;
                }
                if discarded > 0 {
                    warn!(rows = discarded, "Discarded rows submitted before connect failed");
                }
                return;
            }
        };

        let writer = Writer::new(store, self.config.write_timeout());
        info!("Counter batcher running");

        loop {
            match self.collect().await {
                Cycle::Full(batch) => self.flush(&writer, batch).await,
                Cycle::Shutdown(mut batch) => {
                    self.state.send_replace(EngineState::Draining);
                    self.rows.close();
                    while let Some(row) = self.rows.recv().await {
                        StatsCounters::incr(&self.stats.rows_received, 1);
                        batch.push(row);
                    }
                    debug!(rows = batch.len(), "Draining final batch");
                    self.flush(&writer, batch).await;
                    break;
                }
            }
        }

        info!("Counter batcher stopped");
    }

    /// One collection cycle: wait on rows, the idle timer and shutdown until
    /// the batch is full or shutdown fires.
    async fn collect(&mut self) -> Cycle {
        let mut batch = Vec::with_capacity(self.config.batch_size.min(MAX_PREALLOCATED_ROWS));
        let wait = self.config.wait_time();
        let mut ticker = tokio::time::interval_at(Instant::now() + wait, wait);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while batch.len() < self.config.batch_size {
            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow_and_update() {
                        return Cycle::Shutdown(batch);
                    }
                }
                row = self.rows.recv() => match row {
                    Some(row) => {
                        StatsCounters::incr(&self.stats.rows_received, 1);
                        batch.push(row);
                    }
                    None => return Cycle::Shutdown(batch),
                },
                _ = ticker.tick() => {
                    StatsCounters::incr(&self.stats.idle_ticks, 1);
                    trace!(pending = batch.len(), "Idle tick, batch stays open");
                }
            }
        }

        Cycle::Full(batch)
    }

    async fn flush(&self, writer: &Writer, batch: Vec<Row>) {
        if batch.is_empty() {
            return;
        }

        let rows = batch.len();
        let aggregated = aggregate(batch, |location, err| {
            StatsCounters::incr(&self.stats.rejected_rows, 1);
            self.errors.report(location, err);
        });
        let keys = aggregated.len();

        let summary = writer.write(aggregated, &self.errors).await;

        StatsCounters::incr(&self.stats.batches_flushed, 1);
        StatsCounters::incr(&self.stats.keys_written, summary.written);
        StatsCounters::incr(&self.stats.write_failures, summary.failed);

        debug!(
            rows = rows,
            keys = keys,
            written = summary.written,
            failed = summary.failed,
            "Flushed counter batch"
        );
    }
}
