//! Keyring lifecycle integration tests.
//!
//! Exercises create/unlock/lock flows and record round-trips against the
//! real crypto provider and the file-backed storage provider, including
//! persistence across store instances.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tempfile::TempDir;

use strongbox_integration_tests::{fast_crypto, init_tracing};
use strongbox_keyring::{FileStorage, KeyringError, KeyringStore, MemoryStorage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Contact {
    name: String,
    email: Option<String>,
}

fn alice() -> Contact {
    Contact {
        name: "Alice".to_string(),
        email: Some("alice@example.org".to_string()),
    }
}

fn file_store(dir: &TempDir) -> KeyringStore {
    let storage = Arc::new(FileStorage::new(dir.path().join("records")));
    KeyringStore::new(storage, fast_crypto())
}

#[tokio::test]
async fn test_records_persist_across_store_instances() {
    init_tracing();
    let dir = TempDir::new().unwrap();

    {
        let store = file_store(&dir);
        store.create("passw0rd").await.unwrap();
        store.set("contact-1", &alice()).await.unwrap();
        store.lock().await;
    }

    // A brand-new store over the same directory sees the same keyring.
    let store = file_store(&dir);
    store.unlock("passw0rd").await.unwrap();
    let loaded: Option<Contact> = store.get("contact-1").await.unwrap();
    assert_eq!(loaded, Some(alice()));
}

#[tokio::test]
async fn test_unlock_before_create_fails() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);

    assert!(matches!(
        store.unlock("pw").await,
        Err(KeyringError::NotInitialized)
    ));
}

#[tokio::test]
async fn test_wrong_password_across_instances() {
    let dir = TempDir::new().unwrap();

    {
        let store = file_store(&dir);
        store.create("correct").await.unwrap();
    }

    let store = file_store(&dir);
    assert!(matches!(
        store.unlock("incorrect").await,
        Err(KeyringError::MasterKey)
    ));
}

#[tokio::test]
async fn test_password_change_survives_restart() {
    let dir = TempDir::new().unwrap();

    {
        let store = file_store(&dir);
        store.create("original").await.unwrap();
        store.set("contact-1", &alice()).await.unwrap();
        store.change_password("rotated").await.unwrap();
    }

    let store = file_store(&dir);
    assert!(matches!(
        store.unlock("original").await,
        Err(KeyringError::MasterKey)
    ));

    store.unlock("rotated").await.unwrap();
    let loaded: Option<Contact> = store.get("contact-1").await.unwrap();
    assert_eq!(loaded, Some(alice()));
}

#[tokio::test]
async fn test_lock_cuts_off_record_access() {
    let store = KeyringStore::new(Arc::new(MemoryStorage::new()), fast_crypto());
    store.create("pw").await.unwrap();
    store.set("contact-1", &alice()).await.unwrap();

    store.lock().await;

    assert!(matches!(
        store.get::<Contact>("contact-1").await,
        Err(KeyringError::Locked)
    ));
    assert!(matches!(
        store.set("contact-2", &alice()).await,
        Err(KeyringError::Locked)
    ));
    assert!(matches!(
        store.remove("contact-1").await,
        Err(KeyringError::Locked)
    ));

    // Unlocking restores access to the same data.
    store.unlock("pw").await.unwrap();
    let loaded: Option<Contact> = store.get("contact-1").await.unwrap();
    assert_eq!(loaded, Some(alice()));
}

#[tokio::test]
async fn test_reserved_ids_rejected_end_to_end() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    store.create("pw").await.unwrap();

    for id in ["$master", "$reserved", "$"] {
        assert!(
            matches!(
                store.set(id, &alice()).await,
                Err(KeyringError::InvalidId(_))
            ),
            "set({id}) should be rejected"
        );
        assert!(matches!(
            store.get::<Contact>(id).await,
            Err(KeyringError::InvalidId(_))
        ));
        assert!(matches!(
            store.remove(id).await,
            Err(KeyringError::InvalidId(_))
        ));
    }

    // The master blob itself is invisible to the record API.
    assert!(store.list_keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_many_records_roundtrip() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    store.create("pw").await.unwrap();

    for i in 0..20 {
        let contact = Contact {
            name: format!("contact-{i}"),
            email: None,
        };
        store.set(&format!("id-{i}"), &contact).await.unwrap();
    }

    let mut keys = store.list_keys().await.unwrap();
    keys.sort();
    assert_eq!(keys.len(), 20);

    let loaded: Option<Contact> = store.get("id-7").await.unwrap();
    assert_eq!(loaded.unwrap().name, "contact-7");
}
