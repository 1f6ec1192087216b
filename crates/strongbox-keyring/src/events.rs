//! Change notifications emitted by the keyring store.

use serde::{Deserialize, Serialize};

/// Ids touched by a committed mutation.
///
/// `added` covers both newly created and modified-in-place records; at id
/// granularity the two are indistinguishable. A bulk unlock reports every
/// non-reserved id in storage as `added`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Ids added or modified.
    pub added: Vec<String>,

    /// Ids removed.
    pub removed: Vec<String>,
}

impl ChangeEvent {
    /// A change consisting only of additions/modifications.
    pub fn added(ids: Vec<String>) -> Self {
        Self {
            added: ids,
            removed: Vec::new(),
        }
    }

    /// A change consisting only of removals.
    pub fn removed(ids: Vec<String>) -> Self {
        Self {
            added: Vec::new(),
            removed: ids,
        }
    }
}

/// Notification broadcast to store observers.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// Records changed in storage.
    Changed(ChangeEvent),

    /// The store transitioned from Unlocked to Locked; decrypted state
    /// derived from it is no longer valid.
    Locked,
}
