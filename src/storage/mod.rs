//! Counter store implementations.

use std::sync::Arc;

use tracing::info;

use crate::config::{StorageConfig, StorageType};
use crate::interfaces::{DestinationAdmin, Incrementer, Result};

#[cfg(feature = "dynamo")]
pub mod dynamo;
pub mod memory;

#[cfg(feature = "dynamo")]
pub use dynamo::DynamoCounterStore;
pub use memory::MemoryCounterStore;

/// A connected counter store, usable both as the engine's `Incrementer` and
/// for table provisioning.
#[derive(Clone)]
pub enum CounterBackend {
    Memory(Arc<MemoryCounterStore>),
    #[cfg(feature = "dynamo")]
    Dynamo(Arc<DynamoCounterStore>),
}

impl CounterBackend {
    pub fn incrementer(&self) -> Arc<dyn Incrementer> {
        match self {
            Self::Memory(store) => store.clone(),
            #[cfg(feature = "dynamo")]
            Self::Dynamo(store) => store.clone(),
        }
    }

    pub fn admin(&self) -> Arc<dyn DestinationAdmin> {
        match self {
            Self::Memory(store) => store.clone(),
            #[cfg(feature = "dynamo")]
            Self::Dynamo(store) => store.clone(),
        }
    }
}

/// Connect the store selected by `config`.
pub async fn connect(config: &StorageConfig) -> Result<CounterBackend> {
    info!(storage = ?config.storage_type, "Connecting counter store");

    match config.storage_type {
        StorageType::Memory => Ok(CounterBackend::Memory(Arc::new(MemoryCounterStore::new()))),
        #[cfg(feature = "dynamo")]
        StorageType::Dynamo => {
            let store = DynamoCounterStore::connect(config.dynamo.clone()).await?;
            Ok(CounterBackend::Dynamo(Arc::new(store)))
        }
        #[cfg(not(feature = "dynamo"))]
        StorageType::Dynamo => {
            tracing::error!("DynamoDB storage requested but 'dynamo' feature is not enabled");
            Err(crate::interfaces::StoreError::Connection(
                "DynamoDB feature not enabled".to_string(),
            ))
        }
    }
}
