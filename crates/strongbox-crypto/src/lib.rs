//! Asymmetric crypto provider for Strongbox keyrings.
//!
//! Defines the [`AsymmetricCrypto`] contract the keyring layer programs
//! against, and ships [`X25519Provider`] as the default implementation:
//! Argon2id-sealed private keys at rest, X25519 + XChaCha20-Poly1305
//! envelopes on the wire.

pub mod error;
pub mod keypair;
pub mod provider;

pub use error::{CryptoError, Result};
pub use keypair::{KdfParams, Keypair, KeypairMetadata};
pub use provider::{AsymmetricCrypto, X25519Provider};
