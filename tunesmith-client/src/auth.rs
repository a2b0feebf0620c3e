//! Bearer credential holder
//!
//! Holds the API key in memory and mirrors it to a [`KeyValueStore`] so it
//! survives restarts. The HTTP transport reads it on every request.

use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};
use tunesmith_common::{KeyValueStore, Result};

use crate::error::{ApiError, ApiResult};

/// Storage key for the persisted API key
pub const API_KEY_STORAGE_KEY: &str = "suno_api_key";

/// Shared credential holder
///
/// Cloning yields another handle on the same credential.
#[derive(Clone)]
pub struct AuthStore {
    api_key: Arc<RwLock<Option<String>>>,
    storage: Arc<dyn KeyValueStore>,
}

impl AuthStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            api_key: Arc::new(RwLock::new(None)),
            storage,
        }
    }

    /// Load a previously persisted key, if any
    ///
    /// Returns whether a key was loaded.
    pub fn init_from_storage(&self) -> Result<bool> {
        match self.storage.get(API_KEY_STORAGE_KEY)? {
            Some(key) if !key.trim().is_empty() => {
                debug!(key_len = key.len(), "API key loaded from storage");
                self.replace(Some(key));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Store a user-supplied key
    ///
    /// Surrounding whitespace is trimmed; an empty key is rejected and
    /// `Ok(false)` returned without touching the current credential.
    pub fn login(&self, key: &str) -> Result<bool> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(false);
        }

        self.storage.set(API_KEY_STORAGE_KEY, key)?;
        self.replace(Some(key.to_string()));
        info!(key_len = key.len(), "API key stored");
        Ok(true)
    }

    /// Forget the credential in memory and in storage
    pub fn logout(&self) -> Result<()> {
        self.storage.remove(API_KEY_STORAGE_KEY)?;
        self.replace(None);
        info!("API key cleared");
        Ok(())
    }

    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.api_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Current key, or `ApiError::Unauthenticated`
    pub fn require(&self) -> ApiResult<String> {
        self.api_key().ok_or(ApiError::Unauthenticated)
    }

    fn replace(&self, key: Option<String>) {
        *self.api_key.write().unwrap_or_else(PoisonError::into_inner) = key;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tunesmith_common::MemoryKeyValueStore;

    fn store() -> (AuthStore, Arc<MemoryKeyValueStore>) {
        let storage = Arc::new(MemoryKeyValueStore::new());
        (AuthStore::new(storage.clone()), storage)
    }

    #[test]
    fn test_login_persists_trimmed_key() {
        let (auth, storage) = store();

        assert!(auth.login("  test-api-key \n").unwrap());

        assert_eq!(auth.api_key().as_deref(), Some("test-api-key"));
        assert!(auth.is_authenticated());
        assert_eq!(
            storage.get(API_KEY_STORAGE_KEY).unwrap().as_deref(),
            Some("test-api-key")
        );
    }

    #[test]
    fn test_login_rejects_blank_key() {
        let (auth, storage) = store();
        auth.login("first").unwrap();

        assert!(!auth.login("   ").unwrap());

        assert_eq!(auth.api_key().as_deref(), Some("first"));
        assert_eq!(storage.get(API_KEY_STORAGE_KEY).unwrap().as_deref(), Some("first"));
    }

    #[test]
    fn test_init_from_storage() {
        let (auth, storage) = store();
        storage.set(API_KEY_STORAGE_KEY, "stored-api-key").unwrap();

        assert!(auth.init_from_storage().unwrap());
        assert_eq!(auth.api_key().as_deref(), Some("stored-api-key"));
    }

    #[test]
    fn test_init_from_empty_storage() {
        let (auth, _storage) = store();
        assert!(!auth.init_from_storage().unwrap());
        assert!(!auth.is_authenticated());
    }

    #[test]
    fn test_logout_clears_everything() {
        let (auth, storage) = store();
        auth.login("test-key").unwrap();
        let other_handle = auth.clone();

        auth.logout().unwrap();

        assert!(!other_handle.is_authenticated());
        assert!(matches!(auth.require(), Err(ApiError::Unauthenticated)));
        assert_eq!(storage.get(API_KEY_STORAGE_KEY).unwrap(), None);
    }
}
