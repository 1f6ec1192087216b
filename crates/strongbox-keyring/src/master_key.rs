//! Master key lifecycle.
//!
//! The master keypair protects every record in the keyring. Its private
//! half is persisted only as a passphrase-encrypted blob under
//! [`MASTER_KEY_ID`](crate::id::MASTER_KEY_ID); [`obtain_cryptor`] turns a
//! password plus that blob into an [`UnlockedCryptor`], the sole holder of
//! the decrypted key material. The store owns the cryptor exclusively and
//! never hands it out, so `lock()` is the only path to the key material and
//! wiping it cannot leave dangling copies.

use std::sync::Arc;
use tracing::debug;

use strongbox_crypto::{AsymmetricCrypto, Keypair, KeypairMetadata};

use crate::error::{KeyringError, Result};
use crate::id::MASTER_KEY_ID;
use crate::storage::StorageProvider;

/// Identity attributes stamped on newly generated master keys. Policy
/// constants, not caller input.
const MASTER_KEY_NAME: &str = "Strongbox Master Key";
const MASTER_KEY_EMAIL: &str = "master-key@strongbox.invalid";

/// Read the master key blob and unlock it with `password`, optionally
/// creating a fresh keypair when none is persisted yet.
///
/// Failure modes:
/// - no blob and `create_if_absent` is false → [`KeyringError::NotInitialized`]
/// - blob present but unlock fails → [`KeyringError::MasterKey`], whether
///   the password was wrong or the blob is corrupt
///
/// The check-then-create sequence is not guarded against concurrent
/// first-time creation; two racing creators each persist a keypair and the
/// last `set_item` wins.
pub(crate) async fn obtain_cryptor(
    storage: &Arc<dyn StorageProvider>,
    crypto: &Arc<dyn AsymmetricCrypto>,
    password: &str,
    create_if_absent: bool,
) -> Result<UnlockedCryptor> {
    if password.is_empty() {
        return Err(KeyringError::MasterKey);
    }

    let blob = match storage.get_item(MASTER_KEY_ID).await? {
        Some(blob) => blob,
        None => {
            if !create_if_absent {
                return Err(KeyringError::NotInitialized);
            }
            let metadata = KeypairMetadata::new(MASTER_KEY_NAME, MASTER_KEY_EMAIL);
            let blob = crypto.generate_keypair(&metadata, password).await?;
            storage.set_item(MASTER_KEY_ID, blob.clone()).await?;
            debug!("created new master keypair");
            blob
        }
    };

    let keypair = crypto
        .decrypt_private_key(&blob, password)
        .await
        .map_err(|_| KeyringError::MasterKey)?;
    debug!("master key unlocked");

    Ok(UnlockedCryptor {
        keypair: Some(keypair),
        storage: Arc::clone(storage),
        crypto: Arc::clone(crypto),
    })
}

/// In-memory capability over the decrypted master keypair.
///
/// Holds the only decrypted copy of the key material. [`lock`] wipes it
/// synchronously and irreversibly; dropping an unlocked cryptor wipes it
/// too, via the keypair's zeroize-on-drop buffers.
pub(crate) struct UnlockedCryptor {
    keypair: Option<Keypair>,
    storage: Arc<dyn StorageProvider>,
    crypto: Arc<dyn AsymmetricCrypto>,
}

impl UnlockedCryptor {
    /// Encrypt `plaintext` to the master public key.
    pub(crate) async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let keypair = self.keypair.as_ref().ok_or(KeyringError::Locked)?;
        Ok(self.crypto.encrypt(plaintext, keypair.public_key()).await?)
    }

    /// Decrypt an envelope with the master private key.
    pub(crate) async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let keypair = self.keypair.as_ref().ok_or(KeyringError::Locked)?;
        Ok(self.crypto.decrypt(ciphertext, keypair).await?)
    }

    /// Re-encrypt the same key material under `new_password` and overwrite
    /// the persisted blob. Existing records stay valid; envelopes do not
    /// depend on the password.
    pub(crate) async fn change_password(&self, new_password: &str) -> Result<()> {
        if new_password.is_empty() {
            return Err(KeyringError::MasterKey);
        }
        let keypair = self.keypair.as_ref().ok_or(KeyringError::Locked)?;
        let blob = self
            .crypto
            .reencrypt_private_key(keypair, new_password)
            .await?;
        self.storage.set_item(MASTER_KEY_ID, blob).await?;
        debug!("master key password changed");
        Ok(())
    }

    /// Wipe the decrypted key material. Idempotent; the cryptor is
    /// permanently unusable afterwards.
    pub(crate) fn lock(&mut self) {
        if self.keypair.take().is_some() {
            debug!("master key material wiped");
        }
    }
}
