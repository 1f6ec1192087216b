//! Read cache over the keyring store.
//!
//! [`KeyringCache`] mirrors decrypted record values keyed by id. It never
//! mutates its own map on the write path: `add`/`modify`/`remove` delegate
//! to the store, and a background task folds the store's event stream into
//! the map. That keeps the cache in step with what actually committed, even
//! with concurrent writers, at the cost of the map lagging a committed write
//! by one event delivery.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;
use crate::events::{ChangeEvent, StoreEvent};
use crate::store::KeyringStore;

type EntryMap = Arc<RwLock<HashMap<String, Value>>>;

/// Event-synchronized read cache of decrypted records.
pub struct KeyringCache {
    store: Arc<KeyringStore>,
    entries: EntryMap,
    event_task: JoinHandle<()>,
}

impl KeyringCache {
    /// Create a cache over `store` and start consuming its events.
    pub fn new(store: Arc<KeyringStore>) -> Self {
        let entries: EntryMap = Arc::new(RwLock::new(HashMap::new()));
        let rx = store.subscribe();
        let event_task = tokio::spawn(event_loop(Arc::clone(&store), Arc::clone(&entries), rx));
        Self {
            store,
            entries,
            event_task,
        }
    }

    /// Snapshot of all cached entries, in no guaranteed order.
    pub async fn list(&self) -> Vec<(String, Value)> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect()
    }

    /// Number of cached entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache currently holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Fetch a record, preferring the cache and falling through to the
    /// store on a miss. A fall-through hit is cached for next time.
    pub async fn fetch(&self, id: &str) -> Result<Option<Value>> {
        if let Some(value) = self.entries.read().await.get(id) {
            return Ok(Some(value.clone()));
        }

        match self.store.get::<Value>(id).await? {
            Some(value) => {
                let mut entries = self.entries.write().await;
                entries.insert(id.to_string(), value.clone());
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Store a new record. The cache map is updated by the resulting event,
    /// not by this call.
    pub async fn add<T: Serialize + ?Sized>(&self, id: &str, value: &T) -> Result<()> {
        self.store.set(id, value).await
    }

    /// Update an existing record. Identical to [`add`](Self::add); at id
    /// granularity modification and addition are the same operation.
    pub async fn modify<T: Serialize + ?Sized>(&self, id: &str, value: &T) -> Result<()> {
        self.store.set(id, value).await
    }

    /// Remove a record. Eviction happens via the resulting event.
    pub async fn remove(&self, id: &str) -> Result<()> {
        self.store.remove(id).await
    }
}

impl Drop for KeyringCache {
    fn drop(&mut self) {
        self.event_task.abort();
    }
}

/// Fold store events into the entry map until the store goes away.
async fn event_loop(
    store: Arc<KeyringStore>,
    entries: EntryMap,
    mut rx: broadcast::Receiver<StoreEvent>,
) {
    loop {
        match rx.recv().await {
            Ok(StoreEvent::Changed(change)) => {
                apply_change(&store, &entries, change).await;
            }
            Ok(StoreEvent::Locked) => {
                entries.write().await.clear();
                debug!("cache cleared on lock");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event stream lagged; resyncing cache");
                resync(&store, &entries).await;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn apply_change(store: &KeyringStore, entries: &EntryMap, change: ChangeEvent) {
    for id in change.removed {
        entries.write().await.remove(&id);
    }

    for id in change.added {
        match store.get::<Value>(&id).await {
            Ok(Some(value)) => {
                entries.write().await.insert(id, value);
            }
            Ok(None) => {
                // Removed again between event and re-fetch.
                entries.write().await.remove(&id);
            }
            Err(e) => {
                // Best-effort population: an unreadable record stays out of
                // the cache; callers get the definitive answer from the
                // store.
                debug!(id = %id, error = %e, "skipping uncacheable record");
                entries.write().await.remove(&id);
            }
        }
    }
}

/// Rebuild the whole map from storage after losing events.
async fn resync(store: &KeyringStore, entries: &EntryMap) {
    entries.write().await.clear();
    let keys = match store.list_keys().await {
        Ok(keys) => keys,
        // Locked (or unreachable storage): stay empty until the next unlock
        // event repopulates.
        Err(_) => return,
    };
    apply_change(store, entries, ChangeEvent::added(keys)).await;
}
