//! Per-destination summation of a batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::{EngineError, LOC_OVERFLOW, LOC_PARSE};
use crate::schema::{AggregatedRow, DestinationKey, Row};

/// Fold `rows` into one net increment per destination key.
///
/// A delta that is not an integer, or that would overflow the running sum,
/// is reported through `on_error` and left out; the rest of its group and
/// every other group are unaffected. A group whose members were all rejected
/// still yields a zero increment. Output is ordered by destination key.
pub fn aggregate<F>(rows: Vec<Row>, mut on_error: F) -> Vec<AggregatedRow>
where
    F: FnMut(&'static str, EngineError),
{
    let mut groups: BTreeMap<DestinationKey, AggregatedRow> = BTreeMap::new();

    for row in rows {
        let key = row.destination();
        let group = groups.entry(key.clone()).or_insert_with(|| AggregatedRow {
            schema: Arc::clone(&row.schema),
            hash_value: row.hash_value.clone(),
            range_value: row.range_value.clone(),
            delta: 0,
            members: 0,
        });
        group.members += 1;

        match row.delta.parse::<i64>() {
            Ok(delta) => match group.delta.checked_add(delta) {
                Some(sum) => group.delta = sum,
                None => on_error(LOC_OVERFLOW, EngineError::Overflow { key, delta }),
            },
            Err(source) => on_error(
                LOC_PARSE,
                EngineError::InvalidDelta {
                    key,
                    value: row.delta,
                    source,
                },
            ),
        }
    }

    groups.into_values().collect()
}
