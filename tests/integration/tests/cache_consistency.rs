//! Cache/store consistency integration tests.
//!
//! Drives the full caller → cache → store → events loop: mutations made
//! through the cache become visible via the event mechanism, removals
//! evict, and a bulk unlock repopulates the cache from storage.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use strongbox_integration_tests::{eventually, fast_crypto, init_tracing};
use strongbox_keyring::{
    KeyringCache, KeyringStore, MemoryStorage, StoreEvent,
};

fn memory_store() -> Arc<KeyringStore> {
    Arc::new(KeyringStore::new(
        Arc::new(MemoryStorage::new()),
        fast_crypto(),
    ))
}

async fn next_event(
    rx: &mut tokio::sync::broadcast::Receiver<StoreEvent>,
) -> StoreEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for store event")
        .expect("event stream closed")
}

#[tokio::test]
async fn test_full_record_lifecycle_through_cache() {
    init_tracing();
    let store = memory_store();
    store.create("pw1").await.unwrap();

    let cache = KeyringCache::new(store.clone());
    let mut rx = store.subscribe();

    // Add through the cache; the store commits and announces it.
    cache.add("contact-1", &json!({"name": "Alice"})).await.unwrap();
    match next_event(&mut rx).await {
        StoreEvent::Changed(change) => {
            assert_eq!(change.added, vec!["contact-1"]);
            assert!(change.removed.is_empty());
        }
        other => panic!("expected Changed, got {other:?}"),
    }

    assert!(
        eventually(|| async {
            cache.fetch("contact-1").await.unwrap() == Some(json!({"name": "Alice"}))
        })
        .await
    );

    // Remove through the cache; eviction follows the removed event.
    cache.remove("contact-1").await.unwrap();
    match next_event(&mut rx).await {
        StoreEvent::Changed(change) => {
            assert_eq!(change.removed, vec!["contact-1"]);
            assert!(change.added.is_empty());
        }
        other => panic!("expected Changed, got {other:?}"),
    }

    assert!(eventually(|| async { cache.fetch("contact-1").await.unwrap().is_none() }).await);
}

#[tokio::test]
async fn test_unlock_announces_existing_records_once() {
    let store = memory_store();
    store.create("pw1").await.unwrap();
    for id in ["red", "green", "blue"] {
        store.set(id, &json!({ "color": id })).await.unwrap();
    }
    store.lock().await;

    let mut rx = store.subscribe();
    store.unlock("pw1").await.unwrap();

    match next_event(&mut rx).await {
        StoreEvent::Changed(change) => {
            let mut added = change.added;
            added.sort();
            assert_eq!(added, vec!["blue", "green", "red"]);
            assert!(added.iter().all(|id| !id.starts_with('$')));
            assert!(change.removed.is_empty());
        }
        other => panic!("expected Changed, got {other:?}"),
    }

    // Exactly one event for the bulk unlock.
    assert!(matches!(
        rx.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn test_cache_tracks_concurrent_writers() {
    let store = memory_store();
    store.create("pw").await.unwrap();
    let cache = KeyringCache::new(store.clone());

    // Two writers race on disjoint ids, one directly on the store and one
    // through the cache; the cache converges on both.
    let direct = {
        let store = store.clone();
        tokio::spawn(async move {
            for i in 0..5 {
                store
                    .set(&format!("direct-{i}"), &json!({ "n": i }))
                    .await
                    .unwrap();
            }
        })
    };
    for i in 0..5 {
        cache
            .add(&format!("cached-{i}"), &json!({ "n": i }))
            .await
            .unwrap();
    }
    direct.await.unwrap();

    assert!(eventually(|| async { cache.len().await == 10 }).await);
}

#[tokio::test]
async fn test_lock_then_unlock_rebuilds_cache() {
    let store = memory_store();
    store.create("pw").await.unwrap();
    let cache = KeyringCache::new(store.clone());

    cache.add("contact-1", &json!({"name": "Alice"})).await.unwrap();
    assert!(eventually(|| async { cache.len().await == 1 }).await);

    store.lock().await;
    assert!(eventually(|| async { cache.is_empty().await }).await);

    store.unlock("pw").await.unwrap();
    assert!(
        eventually(|| async {
            cache.fetch("contact-1").await.ok().flatten() == Some(json!({"name": "Alice"}))
        })
        .await
    );
}
