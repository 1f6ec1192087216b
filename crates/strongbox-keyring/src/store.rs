//! The keyring store.
//!
//! [`KeyringStore`] orchestrates the master-key lifecycle, enforces the
//! Locked/Unlocked state machine, envelope-encrypts records, and broadcasts
//! a [`StoreEvent`] after every committing mutation. The unlocked cryptor
//! never leaves the store.
//!
//! Locking discipline: the cryptor slot sits behind a `RwLock`. Lifecycle
//! transitions (`create`/`unlock`/`lock`/`change_password`) take the write
//! half, record operations the read half, so record traffic on distinct ids
//! proceeds concurrently while transitions are serialized against everything.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use zeroize::Zeroizing;

use strongbox_crypto::AsymmetricCrypto;

use crate::error::{KeyringError, Result};
use crate::events::{ChangeEvent, StoreEvent};
use crate::id;
use crate::master_key::{obtain_cryptor, UnlockedCryptor};
use crate::storage::StorageProvider;

/// Construction options for [`KeyringStore`].
#[derive(Debug, Clone)]
pub struct KeyringStoreOptions {
    /// Capacity of the event broadcast channel. Slow subscribers that fall
    /// further behind than this see a lag error and must resync.
    pub event_capacity: usize,
}

impl Default for KeyringStoreOptions {
    fn default() -> Self {
        Self { event_capacity: 64 }
    }
}

/// Password-protected encrypted key-value store.
pub struct KeyringStore {
    storage: Arc<dyn StorageProvider>,
    crypto: Arc<dyn AsymmetricCrypto>,
    cryptor: RwLock<Option<UnlockedCryptor>>,
    events: broadcast::Sender<StoreEvent>,
}

impl KeyringStore {
    /// Create a locked store over the given collaborators.
    pub fn new(storage: Arc<dyn StorageProvider>, crypto: Arc<dyn AsymmetricCrypto>) -> Self {
        Self::with_options(storage, crypto, KeyringStoreOptions::default())
    }

    /// Create a locked store with custom options.
    pub fn with_options(
        storage: Arc<dyn StorageProvider>,
        crypto: Arc<dyn AsymmetricCrypto>,
        options: KeyringStoreOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(options.event_capacity);
        Self {
            storage,
            crypto,
            cryptor: RwLock::new(None),
            events,
        }
    }

    /// Subscribe to store events. Every committed mutation, bulk unlock, and
    /// lock transition is delivered to all live subscribers.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Whether key material is currently held.
    pub async fn is_unlocked(&self) -> bool {
        self.cryptor.read().await.is_some()
    }

    /// First-time setup: unlock, creating the master key if none exists.
    pub async fn create(&self, password: &str) -> Result<()> {
        self.unlock_with(password, true).await
    }

    /// Unlock an existing keyring.
    pub async fn unlock(&self, password: &str) -> Result<()> {
        self.unlock_with(password, false).await
    }

    async fn unlock_with(&self, password: &str, create_if_absent: bool) -> Result<()> {
        let mut slot = self.cryptor.write().await;

        // Obtain the fresh cryptor before touching the slot, so a failed
        // unlock leaves the prior state (locked or unlocked) intact.
        let fresh = obtain_cryptor(&self.storage, &self.crypto, password, create_if_absent).await?;
        if let Some(mut previous) = slot.replace(fresh) {
            previous.lock();
        }

        let added = self.non_reserved_keys().await?;
        debug!(records = added.len(), "keyring unlocked");
        self.emit(StoreEvent::Changed(ChangeEvent::added(added)));
        Ok(())
    }

    /// Wipe the key material and transition to Locked. Locking an
    /// already-locked store is a no-op.
    pub async fn lock(&self) {
        let mut slot = self.cryptor.write().await;
        if let Some(mut cryptor) = slot.take() {
            cryptor.lock();
            debug!("keyring locked");
            self.emit(StoreEvent::Locked);
        }
    }

    /// Encrypt and persist `value` under `id`, then emit `{added: [id]}`.
    /// Overwrites any previous value.
    pub async fn set<T: Serialize + ?Sized>(&self, id: &str, value: &T) -> Result<()> {
        let slot = self.cryptor.read().await;
        let cryptor = slot.as_ref().ok_or(KeyringError::Locked)?;
        id::check_record_id(id)?;

        let plaintext = Zeroizing::new(serde_json::to_vec(value)?);
        let envelope = cryptor.encrypt(&plaintext).await?;
        self.storage.set_item(id, envelope).await?;
        drop(slot);

        debug!(id, "record stored");
        self.emit(StoreEvent::Changed(ChangeEvent::added(vec![id.to_string()])));
        Ok(())
    }

    /// Fetch and decrypt the record under `id`.
    ///
    /// Returns `Ok(None)` when the id is absent. A record that exists but
    /// cannot be decrypted or deserialized fails with
    /// [`KeyringError::CorruptRecord`].
    pub async fn get<T: DeserializeOwned>(&self, id: &str) -> Result<Option<T>> {
        let slot = self.cryptor.read().await;
        let cryptor = slot.as_ref().ok_or(KeyringError::Locked)?;
        id::check_record_id(id)?;

        let Some(envelope) = self.storage.get_item(id).await? else {
            return Ok(None);
        };

        let plaintext = Zeroizing::new(
            cryptor
                .decrypt(&envelope)
                .await
                .map_err(|_| KeyringError::CorruptRecord(id.to_string()))?,
        );
        let value = serde_json::from_slice(&plaintext)
            .map_err(|_| KeyringError::CorruptRecord(id.to_string()))?;
        Ok(Some(value))
    }

    /// Delete the record under `id` and emit `{removed: [id]}`.
    ///
    /// Removal does not check existence first; removing an absent id
    /// succeeds and still emits the event.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let slot = self.cryptor.read().await;
        if slot.is_none() {
            return Err(KeyringError::Locked);
        }
        id::check_record_id(id)?;

        self.storage.remove_item(id).await?;
        drop(slot);

        debug!(id, "record removed");
        self.emit(StoreEvent::Changed(ChangeEvent::removed(vec![
            id.to_string()
        ])));
        Ok(())
    }

    /// List every non-reserved record id, in no guaranteed order.
    pub async fn list_keys(&self) -> Result<Vec<String>> {
        let slot = self.cryptor.read().await;
        if slot.is_none() {
            return Err(KeyringError::Locked);
        }
        drop(slot);
        self.non_reserved_keys().await
    }

    /// Re-encrypt the master key under a new password. Records are not
    /// re-encrypted; envelopes do not depend on the password.
    pub async fn change_password(&self, new_password: &str) -> Result<()> {
        let slot = self.cryptor.write().await;
        let cryptor = slot.as_ref().ok_or(KeyringError::Locked)?;
        cryptor.change_password(new_password).await
    }

    async fn non_reserved_keys(&self) -> Result<Vec<String>> {
        Ok(self
            .storage
            .list_keys()
            .await?
            .into_iter()
            .filter(|key| !id::is_reserved(key))
            .collect())
    }

    /// Events are fire-and-forget; a send with no live subscribers is fine.
    fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }
}
