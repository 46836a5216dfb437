//! DynamoDB counter store.
//!
//! Table schema:
//! - `{hash_key}`: partition key (String)
//! - `{range_key}`: sort key (String)
//! - `{atomic_key}`: counter value (Number), created on first increment

mod counter_store;
mod table;

pub use counter_store::DynamoCounterStore;
