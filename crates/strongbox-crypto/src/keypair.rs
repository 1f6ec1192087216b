//! Key material types.
//!
//! A [`Keypair`] is the decrypted, in-memory form of an asymmetric keypair.
//! At rest the private half only ever exists inside an [`EncryptedKeypair`]
//! blob, sealed under a passphrase-derived key. The blob records the KDF
//! parameters it was sealed with, so stored keys keep decrypting after the
//! policy defaults change.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};

/// Identity attributes bound to a keypair at generation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeypairMetadata {
    /// Human-readable owner name.
    pub name: String,

    /// Contact address for the owner.
    pub email: String,
}

impl KeypairMetadata {
    /// Create new metadata.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Argon2id cost parameters used to derive the blob sealing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Number of iterations.
    pub t_cost: u32,
    /// Degree of parallelism.
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 65536,
            t_cost: 3,
            p_cost: 4,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests. Far too weak for real keyrings.
    pub fn insecure_fast() -> Self {
        Self {
            m_cost: 16,
            t_cost: 1,
            p_cost: 1,
        }
    }
}

/// A decrypted asymmetric keypair held in memory.
///
/// The secret half lives in a [`Zeroizing`] buffer and is wiped when the
/// keypair is dropped. `Debug` never prints key material.
pub struct Keypair {
    secret: Zeroizing<Vec<u8>>,
    public: Vec<u8>,
    metadata: KeypairMetadata,
}

impl Keypair {
    /// Assemble a keypair from raw parts. Intended for provider
    /// implementations; callers normally obtain keypairs via
    /// [`crate::AsymmetricCrypto::decrypt_private_key`].
    pub fn from_parts(secret: Vec<u8>, public: Vec<u8>, metadata: KeypairMetadata) -> Self {
        Self {
            secret: Zeroizing::new(secret),
            public,
            metadata,
        }
    }

    /// The public half, as provider-defined bytes.
    pub fn public_key(&self) -> &[u8] {
        &self.public
    }

    /// The secret half. Provider use only; never log or persist unencrypted.
    pub fn secret_bytes(&self) -> &[u8] {
        &self.secret
    }

    /// Identity attributes bound at generation time.
    pub fn metadata(&self) -> &KeypairMetadata {
        &self.metadata
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("secret", &"[REDACTED]")
            .field("public", &hex::encode(&self.public))
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// On-disk representation of a passphrase-protected keypair.
///
/// The ciphertext seals the secret half only; the public half and metadata
/// stay readable, like any key-certificate format.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct EncryptedKeypair {
    /// Blob format version.
    pub version: u32,
    /// KDF parameters this blob was sealed with.
    pub kdf: KdfParams,
    /// Argon2id salt, hex-encoded.
    pub salt: String,
    /// XChaCha20-Poly1305 nonce, base64-encoded.
    pub nonce: String,
    /// Sealed secret half, base64-encoded.
    pub ciphertext: String,
    /// Public half, base64-encoded.
    pub public_key: String,
    /// Identity attributes.
    pub metadata: KeypairMetadata,
}

impl EncryptedKeypair {
    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| CryptoError::InvalidKeyBlob(format!("malformed key blob: {e}")))
    }
}
