//! Engine errors and the caller-supplied error callback.

use std::num::ParseIntError;
use std::sync::Arc;

use tracing::warn;

use crate::interfaces::StoreError;
use crate::schema::DestinationKey;

/// Store client construction failed; the engine stops without taking rows.
pub const LOC_CONNECT: &str = "run.connect";
/// A delta did not parse as an integer and was left out of its group's sum.
pub const LOC_PARSE: &str = "aggregate.parse";
/// A delta would overflow its group's sum and was left out of it.
pub const LOC_OVERFLOW: &str = "aggregate.overflow";
/// The store rejected, or timed out on, one aggregated increment.
pub const LOC_WRITE: &str = "write.increment";

/// Errors surfaced by the batching engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Counter store connection failed: {0}")]
    Connect(#[source] StoreError),

    #[error("Invalid delta '{value}' for {key}")]
    InvalidDelta {
        key: DestinationKey,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("Delta {delta} overflows the batch sum for {key}")]
    Overflow { key: DestinationKey, delta: i64 },

    #[error("Increment failed for {key}: {source}")]
    Write {
        key: DestinationKey,
        #[source]
        source: StoreError,
    },

    #[error("Counter batcher is stopped")]
    Stopped,
}

/// Callback receiving every non-fatal failure, tagged with its location.
pub type ErrorHandler = Arc<dyn Fn(&str, &EngineError) + Send + Sync>;

/// Logs each error, then hands it to the caller's handler.
#[derive(Clone)]
pub(crate) struct ErrorReporter {
    handler: ErrorHandler,
}

impl ErrorReporter {
    pub(crate) fn new(handler: ErrorHandler) -> Self {
        Self { handler }
    }

    pub(crate) fn report(&self, location: &str, err: EngineError) {
        warn!(location = %location, error = %err, "Counter batcher error");
        (self.handler)(location, &err);
    }
}

/// Handler that records `(location, message)` pairs, for tests.
#[cfg(test)]
pub(crate) fn collecting_handler() -> (ErrorHandler, Arc<std::sync::Mutex<Vec<(String, String)>>>)
{
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler: ErrorHandler = Arc::new(move |location: &str, err: &EngineError| {
        sink.lock()
            .unwrap()
            .push((location.to_string(), err.to_string()));
    });
    (handler, seen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_forwards_location_and_error() {
        let (handler, seen) = collecting_handler();
        let reporter = ErrorReporter::new(handler);

        reporter.report(LOC_CONNECT, EngineError::Connect(StoreError::Connection("refused".into())));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "run.connect");
        assert!(seen[0].1.contains("refused"));
    }

    #[test]
    fn test_write_error_names_key_and_cause() {
        let key = DestinationKey {
            table_name: "t".into(),
            hash_value: "h".into(),
            range_value: "r".into(),
        };
        let err = EngineError::Write {
            key,
            source: StoreError::Request("throttled".into()),
        };
        let message = err.to_string();
        assert!(message.contains("t[h/r]"));
        assert!(message.contains("throttled"));
    }
}
