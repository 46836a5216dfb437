//! In-memory counter store.
//!
//! Backs the `memory` storage type and doubles as the test store for the
//! batching engine: every call is recorded and failures can be injected per
//! hash value or globally.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::interfaces::{DestinationAdmin, Incrementer, Result, StoreError};
use crate::schema::{DestinationKey, Row, Schema};

/// In-memory implementation of `Incrementer` and `DestinationAdmin`.
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: RwLock<HashMap<DestinationKey, i64>>,
    calls: RwLock<Vec<Row>>,
    tables: RwLock<HashSet<String>>,
    fail_hashes: RwLock<HashSet<String>>,
    fail_all: RwLock<bool>,
    omit_attribute: RwLock<bool>,
    latency: RwLock<Option<Duration>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every increment whose hash value is `hash`.
    pub async fn fail_for_hash(&self, hash: impl Into<String>) {
        self.fail_hashes.write().await.insert(hash.into());
    }

    pub async fn set_fail_on_increment(&self, fail: bool) {
        *self.fail_all.write().await = fail;
    }

    /// Apply updates but answer without the counter attribute.
    pub async fn set_omit_attribute(&self, omit: bool) {
        *self.omit_attribute.write().await = omit;
    }

    /// Delay every increment by `latency` before applying it.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().await = latency;
    }

    /// Current counter value, if the record exists.
    pub async fn value(&self, key: &DestinationKey) -> Option<i64> {
        self.counters.read().await.get(key).copied()
    }

    /// Every increment received so far, failed ones included.
    pub async fn calls(&self) -> Vec<Row> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    pub async fn has_destination(&self, table_name: &str) -> bool {
        self.tables.read().await.contains(table_name)
    }
}

#[async_trait]
impl Incrementer for MemoryCounterStore {
    async fn increment(&self, row: &Row) -> Result<i64> {
        self.calls.write().await.push(row.clone());

        let latency = *self.latency.read().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if *self.fail_all.read().await || self.fail_hashes.read().await.contains(&row.hash_value)
        {
            return Err(StoreError::Request(format!(
                "injected failure for {}",
                row.destination()
            )));
        }

        let delta: i64 = row.delta.parse().map_err(|_| {
            StoreError::Request(format!(
                "ValidationException: invalid number '{}' for :incr",
                row.delta
            ))
        })?;

        let value = {
            let mut counters = self.counters.write().await;
            let counter = counters.entry(row.destination()).or_insert(0);
            *counter = counter.checked_add(delta).ok_or_else(|| {
                StoreError::Request(format!(
                    "ValidationException: number overflow for {}",
                    row.destination()
                ))
            })?;
            *counter
        };

        debug!(
            table = %row.schema.table_name,
            hash = %row.hash_value,
            range = %row.range_value,
            delta = delta,
            value = value,
            "Applied in-memory increment"
        );

        if *self.omit_attribute.read().await {
            return Err(StoreError::MissingAtomicAttribute {
                attribute: row.schema.atomic_key.clone(),
            });
        }

        Ok(value)
    }
}

#[async_trait]
impl DestinationAdmin for MemoryCounterStore {
    async fn create_destination(&self, schema: &Schema) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.insert(schema.table_name.clone()) {
            return Err(StoreError::Request(format!(
                "ResourceInUseException: table {} already exists",
                schema.table_name
            )));
        }
        Ok(())
    }

    async fn delete_destination(&self, schema: &Schema) -> Result<()> {
        if !self.tables.write().await.remove(&schema.table_name) {
            return Err(StoreError::Request(format!(
                "ResourceNotFoundException: table {} not found",
                schema.table_name
            )));
        }
        self.counters
            .write()
            .await
            .retain(|key, _| key.table_name != schema.table_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
