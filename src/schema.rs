//! Counter destinations and increment requests.
//!
//! A [`Schema`] names a table and the attributes used to address a counter
//! record. A [`Row`] is one increment request against that schema. Rows whose
//! [`DestinationKey`] match are summed into a single [`AggregatedRow`] before
//! being written.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

/// Table layout for an atomic counter.
///
/// Immutable once built; rows share it through an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct Schema {
    /// Table name.
    pub table_name: String,
    /// Partition (hash) key attribute name.
    pub hash_key: String,
    /// Sort (range) key attribute name.
    pub range_key: String,
    /// Numeric attribute holding the counter value.
    pub atomic_key: String,
}

impl Schema {
    pub fn new(
        table_name: impl Into<String>,
        hash_key: impl Into<String>,
        range_key: impl Into<String>,
        atomic_key: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            hash_key: hash_key.into(),
            range_key: range_key.into(),
            atomic_key: atomic_key.into(),
        }
    }

    /// Wrap in an `Arc` for sharing across rows.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

/// One increment request.
///
/// The delta is kept in its wire form (decimal text). It is parsed during
/// aggregation; the direct path hands it to the store as-is, which rejects
/// non-numeric values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub schema: Arc<Schema>,
    pub hash_value: String,
    pub range_value: String,
    pub delta: String,
}

impl Row {
    pub fn new(
        schema: Arc<Schema>,
        hash_value: impl Into<String>,
        range_value: impl Into<String>,
        delta: impl Into<String>,
    ) -> Self {
        Self {
            schema,
            hash_value: hash_value.into(),
            range_value: range_value.into(),
            delta: delta.into(),
        }
    }

    /// Build a row from an integer delta.
    pub fn incr(
        schema: Arc<Schema>,
        hash_value: impl Into<String>,
        range_value: impl Into<String>,
        delta: i64,
    ) -> Self {
        Self::new(schema, hash_value, range_value, delta.to_string())
    }

    /// The (table, hash, range) triple rows aggregate on.
    pub fn destination(&self) -> DestinationKey {
        DestinationKey {
            table_name: self.schema.table_name.clone(),
            hash_value: self.hash_value.clone(),
            range_value: self.range_value.clone(),
        }
    }
}

/// Identity of one counter record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestinationKey {
    pub table_name: String,
    pub hash_value: String,
    pub range_value: String,
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}/{}]",
            self.table_name, self.hash_value, self.range_value
        )
    }
}

/// Net increment for one destination within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedRow {
    pub schema: Arc<Schema>,
    pub hash_value: String,
    pub range_value: String,
    pub delta: i64,
    /// Number of submitted rows folded into this one, including rejected ones.
    pub members: usize,
}

impl AggregatedRow {
    pub fn destination(&self) -> DestinationKey {
        DestinationKey {
            table_name: self.schema.table_name.clone(),
            hash_value: self.hash_value.clone(),
            range_value: self.range_value.clone(),
        }
    }

    /// Wire form handed to the store.
    pub fn to_row(&self) -> Row {
        Row::incr(
            Arc::clone(&self.schema),
            self.hash_value.clone(),
            self.range_value.clone(),
            self.delta,
        )
    }
}
