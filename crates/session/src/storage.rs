//! Key-value storage backends
//!
//! The browser exposes two synchronous stores scoped to the origin:
//! `localStorage` (persists the session) and `sessionStorage` (transient
//! per-tab state such as the redirect-loop counter). Both are modelled by
//! [`KeyValueStore`] so the guard can run against [`MemoryStore`] in tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error("storage is not available")]
    Unavailable,
    #[error("storage error: {0}")]
    Backend(String),
}

/// Synchronous string key-value store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str);
}

/// In-memory store with an optional byte quota
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes once keys plus values would exceed `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(quota) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::{BrowserStorageKind, BrowserStore};

#[cfg(target_arch = "wasm32")]
mod browser {
    use super::{KeyValueStore, StorageError};
    use wasm_bindgen::{JsCast, JsValue};
    use web_sys::{DomException, Storage};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum BrowserStorageKind {
        Local,
        Session,
    }

    /// `localStorage` / `sessionStorage` of the current window
    ///
    /// The handle is looked up on every call so the store stays `Send + Sync`.
    #[derive(Debug, Clone, Copy)]
    pub struct BrowserStore {
        kind: BrowserStorageKind,
    }

    impl BrowserStore {
        pub fn local() -> Self {
            Self {
                kind: BrowserStorageKind::Local,
            }
        }

        pub fn session() -> Self {
            Self {
                kind: BrowserStorageKind::Session,
            }
        }

        fn storage(&self) -> Option<Storage> {
            let window = web_sys::window()?;
            match self.kind {
                BrowserStorageKind::Local => window.local_storage().ok().flatten(),
                BrowserStorageKind::Session => window.session_storage().ok().flatten(),
            }
        }
    }

    fn classify(error: JsValue) -> StorageError {
        match error.dyn_ref::<DomException>() {
            Some(e) if e.name() == "QuotaExceededError" => StorageError::QuotaExceeded,
            Some(e) => StorageError::Backend(e.message()),
            None => StorageError::Backend(format!("{error:?}")),
        }
    }

    impl KeyValueStore for BrowserStore {
        fn get(&self, key: &str) -> Option<String> {
            self.storage()?.get_item(key).ok().flatten()
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            let storage = self.storage().ok_or(StorageError::Unavailable)?;
            storage.set_item(key, value).map_err(classify)
        }

        fn remove(&self, key: &str) {
            if let Some(storage) = self.storage() {
                let _ = storage.remove_item(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get("accessToken").is_none());

        store.set("accessToken", "abc").unwrap();
        assert_eq!(store.get("accessToken").as_deref(), Some("abc"));

        store.remove("accessToken");
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_store_quota() {
        let store = MemoryStore::with_quota(16);
        store.set("key", "12345").unwrap();

        // Overwriting the same key only counts the new value
        store.set("key", "1234567890").unwrap();
        assert_eq!(
            store.set("other", "1234567890"),
            Err(StorageError::QuotaExceeded)
        );
        assert_eq!(store.get("key").as_deref(), Some("1234567890"));
    }
}
