//! Error types for keyring operations.

use strongbox_crypto::CryptoError;
use thiserror::Error;

/// Errors that can occur during keyring operations.
#[derive(Debug, Error)]
pub enum KeyringError {
    /// No master key exists and creation was not requested.
    #[error("Keyring not initialized")]
    NotInitialized,

    /// Password-based unlock of the master key failed.
    ///
    /// Wrong password and corrupted blob are deliberately conflated; the
    /// caller learns only that the unlock did not happen.
    #[error("Master key unlock failed")]
    MasterKey,

    /// An operation required key material while none is held.
    #[error("Keyring is locked")]
    Locked,

    /// A reserved or malformed record id was used through the record API.
    #[error("Invalid record id: {0}")]
    InvalidId(String),

    /// A persisted record exists but cannot be decrypted or deserialized.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Convenience result alias for keyring operations.
pub type Result<T> = std::result::Result<T, KeyringError>;
