//! Storage configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Storage type discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Dynamo,
    Memory,
}

/// Storage configuration (discriminated union).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// DynamoDB-specific configuration.
    pub dynamo: DynamoConfig,
}

impl StorageConfig {
    /// In-memory storage, for tests and dry runs.
    pub fn memory() -> Self {
        Self {
            storage_type: StorageType::Memory,
            dynamo: DynamoConfig::default(),
        }
    }
}

/// DynamoDB-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DynamoConfig {
    /// AWS region. Falls back to the default provider chain when unset.
    pub region: Option<String>,
    /// Custom endpoint URL (DynamoDB Local, LocalStack).
    pub endpoint_url: Option<String>,
    /// Upper bound for a single DynamoDB call.
    /// Default: 300
    pub operation_timeout_secs: u64,
    /// Probe the endpoint with `ListTables` while connecting.
    /// Default: false
    pub verify_connection: bool,
    /// Provisioned read capacity for tables created through the admin API.
    pub read_capacity_units: i64,
    /// Provisioned write capacity for tables created through the admin API.
    pub write_capacity_units: i64,
}

impl Default for DynamoConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            operation_timeout_secs: 300,
            verify_connection: false,
            read_capacity_units: 10,
            write_capacity_units: 10,
        }
    }
}

impl DynamoConfig {
    /// Set AWS region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set custom endpoint URL.
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    /// Require a successful round-trip before the store is handed out.
    pub fn with_verify_connection(mut self, verify: bool) -> Self {
        self.verify_connection = verify;
        self
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_default() {
        let storage = StorageConfig::default();
        assert_eq!(storage.storage_type, StorageType::Dynamo);
        assert!(storage.dynamo.region.is_none());
        assert!(storage.dynamo.endpoint_url.is_none());
        assert_eq!(storage.dynamo.operation_timeout(), Duration::from_secs(300));
        assert!(!storage.dynamo.verify_connection);
    }

    #[test]
    fn test_dynamo_config_builders() {
        let config = DynamoConfig::default()
            .with_region("us-east-1")
            .with_endpoint("http://localhost:8000")
            .with_verify_connection(true);
        assert_eq!(config.region.as_deref(), Some("us-east-1"));
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:8000"));
        assert!(config.verify_connection);
        assert_eq!(config.read_capacity_units, 10);
        assert_eq!(config.write_capacity_units, 10);
    }

    #[test]
    fn test_memory_storage_config() {
        assert_eq!(StorageConfig::memory().storage_type, StorageType::Memory);
    }
}
