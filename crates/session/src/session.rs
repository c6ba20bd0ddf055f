//! Persisted session state

use crate::storage::{KeyValueStore, StorageError};
use std::sync::Arc;

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
/// Storage key for a script-readable refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Storage key for the signed-in username
pub const USERNAME_KEY: &str = "username";
/// Storage key for the remember-me flag ("true"/"false")
pub const REMEMBER_ME_KEY: &str = "rememberMe";

/// Snapshot of what the browser holds for the signed-in user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    /// Absent when the refresh token lives in an HttpOnly cookie
    pub refresh_token: Option<String>,
    pub username: Option<String>,
    pub remember_me: bool,
}

impl Session {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.username.is_none()
    }
}

/// Typed view over the persistent store
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn non_empty(&self, key: &str) -> Option<String> {
        self.store.get(key).filter(|v| !v.is_empty())
    }

    pub fn access_token(&self) -> Option<String> {
        self.non_empty(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.non_empty(REFRESH_TOKEN_KEY)
    }

    pub fn username(&self) -> Option<String> {
        self.non_empty(USERNAME_KEY)
    }

    pub fn remember_me(&self) -> bool {
        self.store.get(REMEMBER_ME_KEY).as_deref() == Some("true")
    }

    pub fn snapshot(&self) -> Session {
        Session {
            access_token: self.access_token(),
            refresh_token: self.refresh_token(),
            username: self.username(),
            remember_me: self.remember_me(),
        }
    }

    /// Persist a freshly created session, replacing whatever was stored
    ///
    /// A failed write leaves no half-written session behind.
    pub fn save(&self, session: &Session) -> Result<(), StorageError> {
        self.clear();
        let result = self.write_all(session);
        if result.is_err() {
            self.clear();
        }
        result
    }

    fn write_all(&self, session: &Session) -> Result<(), StorageError> {
        if let Some(token) = &session.access_token {
            self.set_access_token(token)?;
        }
        if let Some(token) = &session.refresh_token {
            self.set_refresh_token(token)?;
        }
        if let Some(username) = &session.username {
            self.store.set(USERNAME_KEY, username)?;
        }
        self.set_remember_me(session.remember_me)
    }

    pub fn set_access_token(&self, token: &str) -> Result<(), StorageError> {
        self.store.set(ACCESS_TOKEN_KEY, token)
    }

    pub fn set_refresh_token(&self, token: &str) -> Result<(), StorageError> {
        self.store.set(REFRESH_TOKEN_KEY, token)
    }

    pub fn set_remember_me(&self, remember_me: bool) -> Result<(), StorageError> {
        self.store
            .set(REMEMBER_ME_KEY, if remember_me { "true" } else { "false" })
    }

    /// Remove every session key
    pub fn clear(&self) {
        for key in [
            ACCESS_TOKEN_KEY,
            REFRESH_TOKEN_KEY,
            USERNAME_KEY,
            REMEMBER_ME_KEY,
        ] {
            self.store.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn full_session() -> Session {
        Session {
            access_token: Some("a.b.c".to_string()),
            refresh_token: Some("refresh".to_string()),
            username: Some("alice".to_string()),
            remember_me: true,
        }
    }

    #[test]
    fn test_save_and_clear() {
        let backing = Arc::new(MemoryStore::new());
        let store = SessionStore::new(backing.clone());

        store.save(&full_session()).unwrap();
        assert_eq!(store.snapshot(), full_session());

        store.clear();
        assert!(store.snapshot().is_empty());
        assert!(!store.remember_me());
        assert!(backing.is_empty());
    }

    #[test]
    fn test_failed_save_leaves_nothing_behind() {
        let store = SessionStore::new(Arc::new(MemoryStore::with_quota(24)));

        let err = store.save(&full_session()).unwrap_err();
        assert_eq!(err, StorageError::QuotaExceeded);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_empty_values_read_as_absent() {
        let backing = Arc::new(MemoryStore::new());
        backing.set(ACCESS_TOKEN_KEY, "").unwrap();

        let store = SessionStore::new(backing);
        assert!(store.access_token().is_none());
    }
}
