//! Record identifier policy.
//!
//! Ids beginning with `$` are reserved for the keyring's own metadata and
//! are never valid through the record API. The master key blob lives at
//! [`MASTER_KEY_ID`].

use crate::error::{KeyringError, Result};

/// Prefix marking an id as reserved for internal use.
pub const RESERVED_PREFIX: char = '$';

/// Storage id of the password-encrypted master keypair.
pub const MASTER_KEY_ID: &str = "$master";

/// Whether an id belongs to the reserved namespace.
pub fn is_reserved(id: &str) -> bool {
    id.starts_with(RESERVED_PREFIX)
}

/// Validate a caller-supplied record id.
///
/// Rejects reserved-prefix ids and empty ids. Runs before any storage call
/// so invalid ids never reach a backend.
pub fn check_record_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(KeyringError::InvalidId(
            "id must not be empty".to_string(),
        ));
    }
    if is_reserved(id) {
        return Err(KeyringError::InvalidId(format!(
            "id uses the reserved '{RESERVED_PREFIX}' prefix: {id}"
        )));
    }
    Ok(())
}
