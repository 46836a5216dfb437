//! Counter store interface.

use std::num::ParseIntError;
use std::time::Duration;

use async_trait::async_trait;

use crate::schema::{Row, Schema};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur talking to a counter store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Could not get attribute value for the atomic field '{attribute}'")]
    MissingAtomicAttribute { attribute: String },

    #[error("Atomic field '{attribute}' was returned with a non-numeric type")]
    NonNumericCounter { attribute: String },

    #[error("Counter value '{value}' is not an integer")]
    InvalidCounterValue {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Conditional atomic increment.
///
/// Creates the addressed record with the counter at zero when absent, adds
/// the row's delta and returns the value after the update. Every call adds
/// again: retrying a call that actually succeeded double-counts.
///
/// Implementations:
/// - `DynamoCounterStore`: DynamoDB `UpdateItem`
/// - `MemoryCounterStore`: in-memory store with fault injection
#[async_trait]
pub trait Incrementer: Send + Sync {
    async fn increment(&self, row: &Row) -> Result<i64>;
}

/// Provisioning of counter tables. Not used on the hot path.
#[async_trait]
pub trait DestinationAdmin: Send + Sync {
    /// Create the table described by `schema`.
    async fn create_destination(&self, schema: &Schema) -> Result<()>;

    /// Delete the table described by `schema`.
    async fn delete_destination(&self, schema: &Schema) -> Result<()>;
}
