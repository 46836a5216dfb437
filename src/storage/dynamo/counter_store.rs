//! Conditional atomic increments through `UpdateItem`.

use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use tracing::{debug, info};

use crate::config::DynamoConfig;
use crate::interfaces::{Incrementer, Result, StoreError};
use crate::schema::Row;

/// `if_not_exists` seeds a missing counter with zero so the first increment
/// yields `delta` rather than failing on an absent attribute.
const UPDATE_EXPRESSION: &str = "SET #counter = if_not_exists(#counter, :zero) + :incr";
const COUNTER_NAME: &str = "#counter";
const INCR_VALUE: &str = ":incr";
const ZERO_VALUE: &str = ":zero";

/// DynamoDB implementation of `Incrementer` and `DestinationAdmin`.
///
/// The client is cheap to clone and safe for concurrent use; one store can
/// back any number of engines.
pub struct DynamoCounterStore {
    pub(super) client: Client,
    pub(super) config: DynamoConfig,
}

impl DynamoCounterStore {
    /// Build a client from the default provider chain plus the overrides in
    /// `config`.
    pub async fn connect(config: DynamoConfig) -> Result<Self> {
        let mut aws_config_builder = aws_config::defaults(BehaviorVersion::latest());

        if let Some(ref region) = config.region {
            aws_config_builder =
                aws_config_builder.region(aws_config::Region::new(region.clone()));
        }

        if let Some(ref endpoint) = config.endpoint_url {
            aws_config_builder = aws_config_builder.endpoint_url(endpoint);
        }

        let aws_config = aws_config_builder.load().await;

        if aws_config.region().is_none() {
            return Err(StoreError::Connection(
                "no AWS region configured".to_string(),
            ));
        }

        let store = Self::from_client(Client::new(&aws_config), config);

        if store.config.verify_connection {
            store.verify().await?;
        }

        info!(
            region = ?store.config.region,
            endpoint = ?store.config.endpoint_url,
            "Connected to DynamoDB for counters"
        );

        Ok(store)
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client, config: DynamoConfig) -> Self {
        Self { client, config }
    }

    async fn verify(&self) -> Result<()> {
        self.bounded(async {
            self.client
                .list_tables()
                .limit(1)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| {
                    StoreError::Connection(format!(
                        "DynamoDB list_tables probe failed: {}",
                        DisplayErrorContext(&e)
                    ))
                })
        })
        .await
        .map_err(|e| match e {
            StoreError::Timeout(limit) => {
                StoreError::Connection(format!("DynamoDB probe timed out after {:?}", limit))
            }
            other => other,
        })
    }

    /// Run one DynamoDB call under the configured operation timeout.
    pub(super) async fn bounded<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let limit = self.config.operation_timeout();
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| StoreError::Timeout(limit))?
    }
}

#[async_trait]
impl Incrementer for DynamoCounterStore {
    async fn increment(&self, row: &Row) -> Result<i64> {
        let schema = &row.schema;

        let output = self
            .bounded(async {
                self.client
                    .update_item()
                    .table_name(&schema.table_name)
                    .key(&schema.hash_key, AttributeValue::S(row.hash_value.clone()))
                    .key(&schema.range_key, AttributeValue::S(row.range_value.clone()))
                    .update_expression(UPDATE_EXPRESSION)
                    .expression_attribute_names(COUNTER_NAME, &schema.atomic_key)
                    .expression_attribute_values(INCR_VALUE, AttributeValue::N(row.delta.clone()))
                    .expression_attribute_values(ZERO_VALUE, AttributeValue::N("0".to_string()))
                    .return_values(ReturnValue::UpdatedNew)
                    .send()
                    .await
                    .map_err(|e| {
                        StoreError::Request(format!(
                            "DynamoDB update_item failed: {}",
                            DisplayErrorContext(&e)
                        ))
                    })
            })
            .await?;

        let value = counter_value(output.attributes(), &schema.atomic_key)?;

        debug!(
            table = %schema.table_name,
            hash = %row.hash_value,
            range = %row.range_value,
            delta = %row.delta,
            value = value,
            "Incremented counter in DynamoDB"
        );

        Ok(value)
    }
}

/// Extract the post-update counter from an `UPDATED_NEW` response.
pub(crate) fn counter_value(
    attributes: Option<&HashMap<String, AttributeValue>>,
    atomic_key: &str,
) -> Result<i64> {
    let missing = || StoreError::MissingAtomicAttribute {
        attribute: atomic_key.to_string(),
    };

    let number = attributes
        .and_then(|attrs| attrs.get(atomic_key))
        .ok_or_else(missing)?
        .as_n()
        .map_err(|_| StoreError::NonNumericCounter {
            attribute: atomic_key.to_string(),
        })?;

    number
        .parse::<i64>()
        .map_err(|source| StoreError::InvalidCounterValue {
            value: number.clone(),
            source,
        })
}
