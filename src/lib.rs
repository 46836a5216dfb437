//! dyntally - batched atomic counters on DynamoDB
//!
//! Coalesces many small increment requests by destination key and writes one
//! net conditional increment per key per batch, trading a little latency for
//! far fewer writes against hot keys.

pub mod config;
pub mod engine;
pub mod interfaces;
pub mod schema;
pub mod storage;
pub mod utils;

pub use engine::{CounterBatcher, EngineError, EngineState, ErrorHandler, RowSender};
pub use interfaces::{DestinationAdmin, Incrementer, StoreError};
pub use schema::{AggregatedRow, DestinationKey, Row, Schema};
