//! Persistent key-value storage
//!
//! Small string-to-string store used for the bearer credential. Values are
//! stored in plain text; nothing here is encrypted.

use crate::config::write_atomically;
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// String key-value store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing an absent key succeeds
    fn remove(&self, key: &str) -> Result<()>;
}

/// Store backed by a TOML file of string values
///
/// Every operation re-reads the file, so several processes sharing one root
/// folder see each other's writes.
pub struct FileKeyValueStore {
    path: PathBuf,
    // Serializes read-modify-write within this process
    write_lock: Mutex<()>,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        toml::from_str(&content).map_err(|e| {
            Error::Storage(format!("Parse {} failed: {}", self.path.display(), e))
        })
    }

    /// Current entries for a read-modify-write; an unparsable file is replaced
    fn read_for_update(&self) -> Result<BTreeMap<String, String>> {
        match self.read_all() {
            Err(Error::Storage(reason)) => {
                tracing::warn!("Discarding unreadable store: {}", reason);
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let content = toml::to_string(entries)
            .map_err(|e| Error::Storage(format!("Serialize store failed: {}", e)))?;
        write_atomically(&self.path, content.as_bytes())?;
        restrict_permissions(&self.path);
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| Error::Internal("key-value store lock poisoned".to_string()))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock()?;
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock()?;
        let mut entries = self.read_for_update()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock()?;
        match self.read_all() {
            Ok(mut entries) => {
                if entries.remove(key).is_some() {
                    self.write_all(&entries)?;
                }
                Ok(())
            }
            Err(Error::Storage(reason)) => {
                tracing::warn!("Discarding unreadable store: {}", reason);
                self.write_all(&BTreeMap::new())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Could not restrict permissions on {}: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

/// In-memory store, for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Internal("key-value store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(dir.path().join("credentials.toml"));

        assert_eq!(store.get("suno_api_key").unwrap(), None);

        store.set("suno_api_key", "sk-123").unwrap();
        assert_eq!(store.get("suno_api_key").unwrap().as_deref(), Some("sk-123"));

        // A second handle on the same file sees the write
        let other = FileKeyValueStore::new(store.path().to_path_buf());
        assert_eq!(other.get("suno_api_key").unwrap().as_deref(), Some("sk-123"));

        store.remove("suno_api_key").unwrap();
        assert_eq!(other.get("suno_api_key").unwrap(), None);
    }

    #[test]
    fn test_file_store_remove_missing_key_is_ok() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(dir.path().join("nested").join("kv.toml"));

        store.remove("absent").unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let store = FileKeyValueStore::new(path);
        assert!(matches!(store.get("k"), Err(Error::Storage(_))));
    }

    #[test]
    fn test_file_store_set_replaces_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let store = FileKeyValueStore::new(path);
        store.set("suno_api_key", "sk-new").unwrap();

        assert_eq!(store.get("suno_api_key").unwrap().as_deref(), Some("sk-new"));
    }

    #[test]
    fn test_file_store_remove_clears_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let store = FileKeyValueStore::new(path);
        store.remove("suno_api_key").unwrap();

        assert_eq!(store.get("suno_api_key").unwrap(), None);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryKeyValueStore::new();
        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));
        store.remove("a").unwrap();
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }
}
