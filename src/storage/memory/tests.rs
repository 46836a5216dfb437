use std::sync::Arc;
use std::time::Duration;

use crate::interfaces::{DestinationAdmin, Incrementer, StoreError};
use crate::schema::{Row, Schema};

use super::*;

fn schema() -> Arc<Schema> {
    Schema::new("test", "Key", "MonthDay", "Incr").shared()
}

#[tokio::test]
async fn test_increment_creates_and_adds() {
    let store = MemoryCounterStore::new();
    let row = Row::incr(schema(), "test", "12-31", 1);

    assert_eq!(store.increment(&row).await.unwrap(), 1);
    assert_eq!(store.increment(&row).await.unwrap(), 2);
    assert_eq!(store.value(&row.destination()).await, Some(2));
    assert_eq!(store.call_count().await, 2);
}

#[tokio::test]
async fn test_negative_delta() {
    let store = MemoryCounterStore::new();
    let s = schema();

    store.increment(&Row::incr(s.clone(), "k", "r", 10)).await.unwrap();
    let value = store.increment(&Row::incr(s, "k", "r", -3)).await.unwrap();
    assert_eq!(value, 7);
}

#[tokio::test]
async fn test_non_numeric_delta_rejected() {
    let store = MemoryCounterStore::new();
    let row = Row::new(schema(), "k", "r", "five");

    let err = store.increment(&row).await.unwrap_err();
    assert!(matches!(err, StoreError::Request(msg) if msg.contains("ValidationException")));
    assert_eq!(store.value(&row.destination()).await, None);
}

#[tokio::test]
async fn test_fail_for_hash_only_affects_that_hash() {
    let store = MemoryCounterStore::new();
    store.fail_for_hash("bad").await;
    let s = schema();

    assert!(store.increment(&Row::incr(s.clone(), "bad", "r", 1)).await.is_err());
    assert_eq!(store.increment(&Row::incr(s, "good", "r", 1)).await.unwrap(), 1);
    assert_eq!(store.call_count().await, 2);
}

#[tokio::test]
async fn test_fail_on_increment() {
    let store = MemoryCounterStore::new();
    store.set_fail_on_increment(true).await;

    assert!(store.increment(&Row::incr(schema(), "k", "r", 1)).await.is_err());

    store.set_fail_on_increment(false).await;
    assert_eq!(store.increment(&Row::incr(schema(), "k", "r", 1)).await.unwrap(), 1);
}

#[tokio::test]
async fn test_omit_attribute_still_applies_update() {
    let store = MemoryCounterStore::new();
    store.set_omit_attribute(true).await;
    let row = Row::incr(schema(), "k", "r", 4);

    let err = store.increment(&row).await.unwrap_err();
    assert!(matches!(err, StoreError::MissingAtomicAttribute { attribute } if attribute == "Incr"));
    assert_eq!(store.value(&row.destination()).await, Some(4));
}

#[tokio::test]
async fn test_create_and_delete_destination() {
    let store = MemoryCounterStore::new();
    let s = schema();

    store.create_destination(&s).await.unwrap();
    assert!(store.has_destination("test").await);
    assert!(store.create_destination(&s).await.is_err());

    store.increment(&Row::incr(s.clone(), "k", "r", 1)).await.unwrap();
    store.delete_destination(&s).await.unwrap();
    assert!(!store.has_destination("test").await);
    assert_eq!(store.value(&Row::incr(s.clone(), "k", "r", 0).destination()).await, None);

    assert!(store.delete_destination(&s).await.is_err());
}

#[tokio::test]
async fn test_latency_setting_not_locked_during_sleep() {
    let store = Arc::new(MemoryCounterStore::new());
    store.set_latency(Some(Duration::from_millis(500))).await;

    let slow = Arc::clone(&store);
    let pending =
        tokio::spawn(async move { slow.increment(&Row::incr(schema(), "k", "r", 1)).await });
    while store.call_count().await == 0 {
        tokio::task::yield_now().await;
    }

    tokio::time::timeout(Duration::from_millis(100), store.set_latency(None))
        .await
        .expect("latency lock held across sleep");

    assert_eq!(pending.await.unwrap().unwrap(), 1);
}
