//! The asymmetric crypto provider contract and its default implementation.
//!
//! [`AsymmetricCrypto`] is the seam the keyring layer programs against: key
//! generation, passphrase-based private-key unlock and re-encryption, and
//! public-key message encryption. [`X25519Provider`] is the bundled
//! implementation: Argon2id seals the private scalar at rest, and message
//! envelopes are ephemeral-static X25519 DH with HKDF-SHA256 key expansion
//! into XChaCha20-Poly1305.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CryptoError, Result};
use crate::keypair::{EncryptedKeypair, KdfParams, Keypair, KeypairMetadata};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;
const SALT_LEN: usize = 32;

const BLOB_VERSION: u32 = 1;
const ENVELOPE_VERSION: u32 = 1;

/// HKDF info string used to domain-separate envelope keys.
const ENVELOPE_HKDF_INFO: &[u8] = b"strongbox-envelope-v1";

/// Async contract for asymmetric crypto providers.
///
/// Implementations must be object-safe; the keyring layer holds providers as
/// `Arc<dyn AsymmetricCrypto>`. Key material crosses this boundary either as
/// an opaque encrypted blob (at rest) or as a [`Keypair`] (in memory).
#[async_trait]
pub trait AsymmetricCrypto: Send + Sync {
    /// Generate a fresh keypair, seal its private half under `passphrase`,
    /// and return the serialized blob.
    async fn generate_keypair(
        &self,
        metadata: &KeypairMetadata,
        passphrase: &str,
    ) -> Result<Vec<u8>>;

    /// Unlock a serialized blob with `passphrase`.
    ///
    /// Fails with [`CryptoError::UnlockFailed`] on a wrong passphrase or a
    /// tampered ciphertext, without distinguishing the two.
    async fn decrypt_private_key(&self, blob: &[u8], passphrase: &str) -> Result<Keypair>;

    /// Re-seal the same key material under a new passphrase.
    async fn reencrypt_private_key(
        &self,
        keypair: &Keypair,
        new_passphrase: &str,
    ) -> Result<Vec<u8>>;

    /// Encrypt `plaintext` so that only the holder of the matching private
    /// key can read it.
    async fn encrypt(&self, plaintext: &[u8], public_key: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt an envelope produced by [`AsymmetricCrypto::encrypt`].
    async fn decrypt(&self, ciphertext: &[u8], keypair: &Keypair) -> Result<Vec<u8>>;
}

/// Per-message envelope, serialized as JSON.
#[derive(Serialize, Deserialize)]
struct Envelope {
    /// Envelope format version.
    version: u32,
    /// Ephemeral X25519 public key, base64-encoded.
    epk: String,
    /// XChaCha20-Poly1305 nonce, base64-encoded.
    nonce: String,
    /// AEAD ciphertext with tag, base64-encoded.
    ciphertext: String,
}

/// Default X25519-based provider.
///
/// KDF cost parameters are fixed at construction; blobs record the
/// parameters they were sealed with, so changing them never breaks
/// previously stored keys.
#[derive(Debug, Clone)]
pub struct X25519Provider {
    kdf: KdfParams,
}

impl Default for X25519Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl X25519Provider {
    /// Create a provider with the default KDF parameters.
    pub fn new() -> Self {
        Self {
            kdf: KdfParams::default(),
        }
    }

    /// Create a provider with custom KDF parameters.
    pub fn with_kdf_params(kdf: KdfParams) -> Self {
        Self { kdf }
    }

    /// Seal `secret` under `passphrase` into a serialized blob.
    async fn seal(
        &self,
        secret: &[u8],
        public: &[u8],
        metadata: &KeypairMetadata,
        passphrase: &str,
    ) -> Result<Vec<u8>> {
        let mut salt = vec![0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let key = derive_sealing_key_blocking(passphrase, salt.clone(), self.kdf).await?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), secret)
            .map_err(|e| CryptoError::KeyGeneration(format!("seal private key: {e}")))?;

        let blob = EncryptedKeypair {
            version: BLOB_VERSION,
            kdf: self.kdf,
            salt: hex::encode(&salt),
            nonce: general_purpose::STANDARD.encode(nonce),
            ciphertext: general_purpose::STANDARD.encode(&ciphertext),
            public_key: general_purpose::STANDARD.encode(public),
            metadata: metadata.clone(),
        };
        blob.to_bytes()
    }
}

#[async_trait]
impl AsymmetricCrypto for X25519Provider {
    async fn generate_keypair(
        &self,
        metadata: &KeypairMetadata,
        passphrase: &str,
    ) -> Result<Vec<u8>> {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        debug!(name = %metadata.name, "generated new x25519 keypair");
        self.seal(secret.as_bytes(), public.as_bytes(), metadata, passphrase)
            .await
    }

    async fn decrypt_private_key(&self, blob: &[u8], passphrase: &str) -> Result<Keypair> {
        let blob = EncryptedKeypair::from_bytes(blob)?;
        if blob.version != BLOB_VERSION {
            return Err(CryptoError::InvalidKeyBlob(format!(
                "unsupported blob version {}",
                blob.version
            )));
        }

        let salt = hex::decode(&blob.salt)
            .map_err(|e| CryptoError::InvalidKeyBlob(format!("salt: {e}")))?;
        let nonce = general_purpose::STANDARD
            .decode(&blob.nonce)
            .map_err(|e| CryptoError::InvalidKeyBlob(format!("nonce: {e}")))?;
        if nonce.len() != NONCE_LEN {
            return Err(CryptoError::InvalidKeyBlob(format!(
                "nonce must be {NONCE_LEN} bytes, got {}",
                nonce.len()
            )));
        }
        let ciphertext = general_purpose::STANDARD
            .decode(&blob.ciphertext)
            .map_err(|e| CryptoError::InvalidKeyBlob(format!("ciphertext: {e}")))?;

        // Derive with the parameters recorded in the blob, not the current
        // policy defaults.
        let key = derive_sealing_key_blocking(passphrase, salt, blob.kdf).await?;

        let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
        let secret_bytes = Zeroizing::new(
            cipher
                .decrypt(XNonce::from_slice(&nonce), ciphertext.as_slice())
                .map_err(|_| CryptoError::UnlockFailed)?,
        );

        let mut secret_arr: [u8; KEY_LEN] = secret_bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyBlob("secret half has wrong length".to_string()))?;
        let secret = StaticSecret::from(secret_arr);
        secret_arr.zeroize();

        // The public half is recomputed from the decrypted scalar; the blob
        // field is informational and not authenticated.
        let public = PublicKey::from(&secret);
        Ok(Keypair::from_parts(
            secret.as_bytes().to_vec(),
            public.as_bytes().to_vec(),
            blob.metadata,
        ))
    }

    async fn reencrypt_private_key(
        &self,
        keypair: &Keypair,
        new_passphrase: &str,
    ) -> Result<Vec<u8>> {
        self.seal(
            keypair.secret_bytes(),
            keypair.public_key(),
            keypair.metadata(),
            new_passphrase,
        )
        .await
    }

    async fn encrypt(&self, plaintext: &[u8], public_key: &[u8]) -> Result<Vec<u8>> {
        let recipient: [u8; KEY_LEN] = public_key
            .try_into()
            .map_err(|_| CryptoError::Encrypt("recipient key must be 32 bytes".to_string()))?;
        let recipient = PublicKey::from(recipient);

        let ephemeral = EphemeralSecret::random_from_rng(OsRng);
        let epk = PublicKey::from(&ephemeral);
        let shared = ephemeral.diffie_hellman(&recipient);
        let key = expand_envelope_key(epk.as_bytes(), shared.as_bytes())?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|e| CryptoError::Encrypt(format!("seal envelope: {e}")))?;

        let envelope = Envelope {
            version: ENVELOPE_VERSION,
            epk: general_purpose::STANDARD.encode(epk.as_bytes()),
            nonce: general_purpose::STANDARD.encode(nonce),
            ciphertext: general_purpose::STANDARD.encode(&ciphertext),
        };
        Ok(serde_json::to_vec(&envelope)?)
    }

    async fn decrypt(&self, ciphertext: &[u8], keypair: &Keypair) -> Result<Vec<u8>> {
        let envelope: Envelope = serde_json::from_slice(ciphertext)
            .map_err(|e| CryptoError::Decrypt(format!("malformed envelope: {e}")))?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(CryptoError::Decrypt(format!(
                "unsupported envelope version {}",
                envelope.version
            )));
        }

        let epk_bytes = general_purpose::STANDARD
            .decode(&envelope.epk)
            .map_err(|e| CryptoError::Decrypt(format!("epk: {e}")))?;
        let epk_arr: [u8; KEY_LEN] = epk_bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::Decrypt("epk must be 32 bytes".to_string()))?;
        let nonce = general_purpose::STANDARD
            .decode(&envelope.nonce)
            .map_err(|e| CryptoError::Decrypt(format!("nonce: {e}")))?;
        if nonce.len() != NONCE_LEN {
            return Err(CryptoError::Decrypt(format!(
                "nonce must be {NONCE_LEN} bytes, got {}",
                nonce.len()
            )));
        }
        let sealed = general_purpose::STANDARD
            .decode(&envelope.ciphertext)
            .map_err(|e| CryptoError::Decrypt(format!("ciphertext: {e}")))?;

        let mut secret_arr: [u8; KEY_LEN] = keypair
            .secret_bytes()
            .try_into()
            .map_err(|_| CryptoError::Decrypt("secret key must be 32 bytes".to_string()))?;
        let secret = StaticSecret::from(secret_arr);
        secret_arr.zeroize();

        let shared = secret.diffie_hellman(&PublicKey::from(epk_arr));
        let key = expand_envelope_key(&epk_arr, shared.as_bytes())?;

        let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
        cipher
            .decrypt(XNonce::from_slice(&nonce), sealed.as_slice())
            .map_err(|e| CryptoError::Decrypt(format!("open envelope: {e}")))
    }
}

/// Expand the DH shared secret into an AEAD key, salted with the ephemeral
/// public key so distinct envelopes never share a key even on RNG misuse.
fn expand_envelope_key(epk: &[u8], shared: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let hk = Hkdf::<Sha256>::new(Some(epk), shared);
    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(ENVELOPE_HKDF_INFO, okm.as_mut_slice())
        .map_err(|e| CryptoError::Kdf(format!("hkdf expand: {e}")))?;
    Ok(okm)
}

/// Argon2id derivation of the blob sealing key.
fn derive_sealing_key(
    passphrase: &str,
    salt: &[u8],
    params: KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let params = argon2::Params::new(params.m_cost, params.t_cost, params.p_cost, Some(KEY_LEN))
        .map_err(|e| CryptoError::Kdf(format!("argon2 params: {e}")))?;
    let argon = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon
        .hash_password_into(passphrase.as_bytes(), salt, key.as_mut_slice())
        .map_err(|e| CryptoError::Kdf(format!("argon2 derive: {e}")))?;
    Ok(key)
}

/// Run the KDF on the blocking pool; memory-hard derivation would otherwise
/// stall the async executor.
async fn derive_sealing_key_blocking(
    passphrase: &str,
    salt: Vec<u8>,
    params: KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let passphrase = Zeroizing::new(passphrase.to_owned());
    tokio::task::spawn_blocking(move || derive_sealing_key(&passphrase, &salt, params))
        .await
        .map_err(|e| CryptoError::Kdf(format!("kdf task: {e}")))?
}
