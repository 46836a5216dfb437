//! DynamoDB counter store integration tests using testcontainers.
//!
//! Run with: cargo test --test storage_dynamo --features dynamodb-local -- --nocapture
//!
//! Uses amazon/dynamodb-local. Tests share a single container.

#![cfg(feature = "dynamodb-local")]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dyntally::config::{DynamoConfig, EngineConfig};
use dyntally::engine::{CounterBatcher, EngineError, ErrorHandler};
use dyntally::interfaces::{DestinationAdmin, Incrementer, StoreError};
use dyntally::schema::{Row, Schema};
use dyntally::storage::DynamoCounterStore;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage,
};
use tokio::sync::OnceCell;

/// Shared DynamoDB Local container and endpoint URL.
static DYNAMODB: OnceCell<(ContainerAsync<GenericImage>, String)> = OnceCell::const_new();

async fn get_endpoint() -> String {
    let (_, endpoint) = DYNAMODB
        .get_or_init(|| async {
            println!("Starting shared DynamoDB Local container...");
            let container = GenericImage::new("amazon/dynamodb-local", "latest")
                .with_exposed_port(8000.tcp())
                .with_wait_for(WaitFor::message_on_stdout("Initializing DynamoDB Local"))
                .start()
                .await
                .expect("Failed to start dynamodb-local container");

            let host = container
                .get_host()
                .await
                .expect("Failed to get container host");
            let port = container
                .get_host_port_ipv4(8000)
                .await
                .expect("Failed to get mapped port");
            let endpoint = format!("http://{}:{}", host, port);
            println!("DynamoDB Local available at: {}", endpoint);
            (container, endpoint)
        })
        .await;
    endpoint.clone()
}

async fn store() -> DynamoCounterStore {
    // DynamoDB Local accepts any credentials.
    std::env::set_var("AWS_ACCESS_KEY_ID", "fake");
    std::env::set_var("AWS_SECRET_ACCESS_KEY", "fake");

    let config = DynamoConfig::default()
        .with_region("us-east-1")
        .with_endpoint(get_endpoint().await)
        .with_verify_connection(true);
    DynamoCounterStore::connect(config)
        .await
        .expect("Failed to connect to DynamoDB Local")
}

fn schema(test: &str) -> Arc<Schema> {
    Schema::new(
        format!("dyntally-{}-{}", test, std::process::id()),
        "Key",
        "MonthDay",
        "Incr",
    )
    .shared()
}

#[tokio::test]
async fn test_increment_creates_then_adds() {
    let store = store().await;
    let schema = schema("increment");
    store.create_destination(&schema).await.unwrap();

    let row = Row::incr(schema.clone(), "test", "12-31", 1);
    assert_eq!(store.increment(&row).await.unwrap(), 1);
    assert_eq!(store.increment(&row).await.unwrap(), 2);

    let row = Row::incr(schema.clone(), "test", "12-31", 5);
    assert_eq!(store.increment(&row).await.unwrap(), 7);

    let other = Row::incr(schema.clone(), "test", "01-01", -3);
    assert_eq!(store.increment(&other).await.unwrap(), -3);

    store.delete_destination(&schema).await.unwrap();
}

#[tokio::test]
async fn test_non_numeric_delta_is_store_error() {
    let store = store().await;
    let schema = schema("validation");
    store.create_destination(&schema).await.unwrap();

    let row = Row::new(schema.clone(), "test", "12-31", "five");
    let err = store.increment(&row).await.unwrap_err();
    assert!(matches!(err, StoreError::Request(_)));

    store.delete_destination(&schema).await.unwrap();
}

#[tokio::test]
async fn test_increment_against_missing_table_fails() {
    let store = store().await;
    let schema = schema("missing");

    let row = Row::incr(schema, "test", "12-31", 1);
    assert!(matches!(
        store.increment(&row).await,
        Err(StoreError::Request(_))
    ));
}

#[tokio::test]
async fn test_batched_flush_matches_direct_sum() {
    let store = Arc::new(store().await);
    let schema = schema("batched");
    store.create_destination(&schema).await.unwrap();

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let on_error: ErrorHandler = Arc::new(move |location: &str, err: &EngineError| {
        sink.lock().unwrap().push(format!("{}: {}", location, err));
    });

    let batcher = CounterBatcher::with_store(
        EngineConfig::new(100, Duration::from_secs(1)),
        store.clone(),
        on_error,
    )
    .unwrap();

    for _ in 0..4 {
        batcher
            .submit(Row::incr(schema.clone(), "K", "12-31", 5))
            .await
            .unwrap();
    }
    batcher.shutdown_and_wait().await;
    assert!(errors.lock().unwrap().is_empty(), "{:?}", errors.lock().unwrap());

    let value = store
        .increment(&Row::incr(schema.clone(), "K", "12-31", 0))
        .await
        .unwrap();
    assert_eq!(value, 20);

    store.delete_destination(&schema).await.unwrap();
}

#[tokio::test]
async fn test_create_existing_table_fails() {
    let store = store().await;
    let schema = schema("duplicate");
    store.create_destination(&schema).await.unwrap();

    assert!(store.create_destination(&schema).await.is_err());

    store.delete_destination(&schema).await.unwrap();
}
