//! Table provisioning, used by setup and test tooling.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{BuildError, DisplayErrorContext};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, KeySchemaElement, KeyType, ProvisionedThroughput, ScalarAttributeType,
    TableStatus,
};
use tracing::info;

use super::DynamoCounterStore;
use crate::interfaces::{DestinationAdmin, Result, StoreError};
use crate::schema::Schema;

const ACTIVE_POLL_INTERVAL: Duration = Duration::from_millis(250);

fn invalid_definition(e: BuildError) -> StoreError {
    StoreError::Request(format!("Invalid table definition: {}", e))
}

impl DynamoCounterStore {
    async fn wait_until_active(&self, table_name: &str) -> Result<()> {
        loop {
            let output = self
                .client
                .describe_table()
                .table_name(table_name)
                .send()
                .await
                .map_err(|e| {
                    StoreError::Request(format!(
                        "DynamoDB describe_table failed: {}",
                        DisplayErrorContext(&e)
                    ))
                })?;

            let status = output.table().and_then(|t| t.table_status());
            if status == Some(&TableStatus::Active) {
                return Ok(());
            }
            tokio::time::sleep(ACTIVE_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl DestinationAdmin for DynamoCounterStore {
    async fn create_destination(&self, schema: &Schema) -> Result<()> {
        let hash_attr = AttributeDefinition::builder()
            .attribute_name(&schema.hash_key)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(invalid_definition)?;
        let range_attr = AttributeDefinition::builder()
            .attribute_name(&schema.range_key)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(invalid_definition)?;
        let hash_key = KeySchemaElement::builder()
            .attribute_name(&schema.hash_key)
            .key_type(KeyType::Hash)
            .build()
            .map_err(invalid_definition)?;
        let range_key = KeySchemaElement::builder()
            .attribute_name(&schema.range_key)
            .key_type(KeyType::Range)
            .build()
            .map_err(invalid_definition)?;
        let throughput = ProvisionedThroughput::builder()
            .read_capacity_units(self.config.read_capacity_units)
            .write_capacity_units(self.config.write_capacity_units)
            .build()
            .map_err(invalid_definition)?;

        self.bounded(async {
            self.client
                .create_table()
                .table_name(&schema.table_name)
                .attribute_definitions(hash_attr)
                .attribute_definitions(range_attr)
                .key_schema(hash_key)
                .key_schema(range_key)
                .provisioned_throughput(throughput)
                .send()
                .await
                .map_err(|e| {
                    StoreError::Request(format!(
                        "DynamoDB create_table failed: {}",
                        DisplayErrorContext(&e)
                    ))
                })?;

            self.wait_until_active(&schema.table_name).await
        })
        .await?;

        info!(table = %schema.table_name, "Created DynamoDB counter table");
        Ok(())
    }

    async fn delete_destination(&self, schema: &Schema) -> Result<()> {
        self.bounded(async {
            self.client
                .delete_table()
                .table_name(&schema.table_name)
                .send()
                .await
                .map_err(|e| {
                    StoreError::Request(format!(
                        "DynamoDB delete_table failed: {}",
                        DisplayErrorContext(&e)
                    ))
                })
        })
        .await?;

        info!(table = %schema.table_name, "Deleted DynamoDB counter table");
        Ok(())
    }
}
