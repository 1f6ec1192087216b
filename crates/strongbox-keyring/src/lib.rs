//! Password-protected encrypted key-value keyring.
//!
//! A [`KeyringStore`] keeps every record envelope-encrypted under a single
//! master keypair, itself persisted only in password-encrypted form. Unlock
//! derives the in-memory key material; lock wipes it irreversibly. Mutations
//! broadcast [`StoreEvent`]s, which a [`KeyringCache`] folds into a
//! decrypted read cache.
//!
//! Storage and asymmetric crypto are pluggable: anything implementing
//! [`StorageProvider`] persists the keyring, and any
//! [`strongbox_crypto::AsymmetricCrypto`] provider supplies the key
//! operations.

pub mod cache;
pub mod error;
pub mod events;
pub mod id;
pub mod paths;
pub mod storage;
pub mod store;

mod master_key;

pub use cache::KeyringCache;
pub use error::{KeyringError, Result};
pub use events::{ChangeEvent, StoreEvent};
pub use id::{MASTER_KEY_ID, RESERVED_PREFIX};
pub use storage::{FileStorage, MemoryStorage, StorageProvider};
pub use store::{KeyringStore, KeyringStoreOptions};
