//! Batching engine configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::engine::EngineError;

/// Batch triggers and channel sizing for the counter batcher.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rows collected before a batch is aggregated and written.
    /// Default: 100
    pub batch_size: usize,
    /// Idle timer period. A tick does not flush; it only wakes the collector.
    /// Default: 1000
    pub wait_time_ms: u64,
    /// Inbound channel buffer. Producers block once it is full.
    /// Default: 1
    pub channel_capacity: usize,
    /// Upper bound for one store call issued by the writer.
    /// Default: 300000 (five minutes)
    pub write_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            wait_time_ms: 1000,
            channel_capacity: 1,
            write_timeout_ms: 300_000,
        }
    }
}

impl EngineConfig {
    pub fn new(batch_size: usize, wait_time: Duration) -> Self {
        Self {
            batch_size,
            wait_time_ms: millis_rounded_up(wait_time),
            ..Default::default()
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout_ms = millis_rounded_up(timeout);
        self
    }

    pub fn wait_time(&self) -> Duration {
        Duration::from_millis(self.wait_time_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Reject settings the collector cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.batch_size == 0 {
            return Err(EngineError::InvalidConfig(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.wait_time_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "wait_time_ms must be greater than zero".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "channel_capacity must be greater than zero".to_string(),
            ));
        }
        if self.write_timeout_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "write_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Whole milliseconds, rounding any sub-millisecond remainder up so a
/// positive duration never becomes zero.
fn millis_rounded_up(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}
