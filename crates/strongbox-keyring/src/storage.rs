//! Storage provider contract and bundled backends.
//!
//! The keyring persists opaque byte values under string ids; anything that
//! can do async get/set/remove/list satisfies [`StorageProvider`].
//! [`MemoryStorage`] backs tests and embedded use, [`FileStorage`] persists
//! one file per id under a directory with restrictive permissions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{KeyringError, Result};
use crate::paths;

/// Async trait for keyring storage backends.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Fetch the value stored under `id`, if any.
    async fn get_item(&self, id: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `id`, replacing any previous value.
    async fn set_item(&self, id: &str, value: Vec<u8>) -> Result<()>;

    /// Delete the value under `id`. Deleting an absent id is not an error.
    async fn remove_item(&self, id: &str) -> Result<()>;

    /// List every stored id, in no guaranteed order.
    async fn list_keys(&self) -> Result<Vec<String>>;
}

/// In-memory storage backend.
#[derive(Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// Create an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageProvider for MemoryStorage {
    async fn get_item(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let items = self.items.read().await;
        Ok(items.get(id).cloned())
    }

    async fn set_item(&self, id: &str, value: Vec<u8>) -> Result<()> {
        let mut items = self.items.write().await;
        items.insert(id.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, id: &str) -> Result<()> {
        let mut items = self.items.write().await;
        items.remove(id);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let items = self.items.read().await;
        Ok(items.keys().cloned().collect())
    }
}

/// File extension for stored values.
const ITEM_EXT: &str = "rec";

/// A file-system-backed storage provider.
///
/// Each id maps to `{base_dir}/{hex(id)}.rec`; hex-encoding the id keeps
/// arbitrary id strings filename-safe. Files are created with mode `0600`
/// and the directory with `0700` on Unix.
pub struct FileStorage {
    base_dir: PathBuf,
}

impl FileStorage {
    /// Create a storage backend rooted at `base_dir`.
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Create a storage backend at the default directory
    /// (`~/.strongbox/records`).
    pub fn from_default_dir() -> Result<Self> {
        Ok(Self::new(paths::records_dir()?))
    }

    /// Ensure the base directory exists with restrictive permissions.
    async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_dir).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            tokio::fs::set_permissions(&self.base_dir, perms).await?;
        }

        Ok(())
    }

    /// Resolve the file path for an id.
    fn item_path(&self, id: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.{ITEM_EXT}", hex::encode(id.as_bytes())))
    }
}

/// Recover the original id from a storage filename, if it is one of ours.
fn decode_item_stem(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some(ITEM_EXT) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let bytes = hex::decode(stem).ok()?;
    String::from_utf8(bytes).ok()
}

/// Write `data` to `path` with mode 0600 on Unix.
async fn write_item_file(path: &Path, data: &[u8]) -> Result<()> {
    tokio::fs::write(path, data).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(path, perms).await?;
    }

    Ok(())
}

#[async_trait]
impl StorageProvider for FileStorage {
    async fn get_item(&self, id: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.item_path(id)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KeyringError::Io(e)),
        }
    }

    async fn set_item(&self, id: &str, value: Vec<u8>) -> Result<()> {
        self.ensure_dir().await?;
        let path = self.item_path(id);
        debug!(id, path = %path.display(), "writing item");
        write_item_file(&path, &value).await
    }

    async fn remove_item(&self, id: &str) -> Result<()> {
        match tokio::fs::remove_file(self.item_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KeyringError::Io(e)),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.base_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            match decode_item_stem(&path) {
                Some(id) => keys.push(id),
                None => {
                    warn!(path = %path.display(), "skipping foreign file in storage dir");
                }
            }
        }

        Ok(keys)
    }
}
