//! Error types for crypto provider operations.

use thiserror::Error;

/// Errors that can occur inside a crypto provider.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Invalid key blob: {0}")]
    InvalidKeyBlob(String),

    /// Passphrase-based unlock of a private key failed.
    ///
    /// Carries no detail on purpose: a wrong passphrase and a corrupted
    /// ciphertext are indistinguishable to the caller.
    #[error("Private key unlock failed")]
    UnlockFailed,

    #[error("Key derivation failed: {0}")]
    Kdf(String),

    #[error("Encryption failed: {0}")]
    Encrypt(String),

    #[error("Decryption failed: {0}")]
    Decrypt(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
