//! Abstract interfaces for dyntally components.
//!
//! These traits define the contracts for:
//! - Counter increments (the only call on the hot path)
//! - Destination provisioning (test and setup tooling)

pub mod counter_store;

pub use counter_store::{DestinationAdmin, Incrementer, Result, StoreError};
