//! Shared fixtures for session guard integration tests

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use console_session::{
    KeyValueStore, ManualClock, MemoryStore, Notice, PageContext, SessionConfig, SessionGuard,
    session::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, REMEMBER_ME_KEY, USERNAME_KEY},
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::MockServer;

/// Fixed "now" of every test clock
pub const NOW: i64 = 1_700_000_000;

pub fn token_with_claims(claims: serde_json::Value) -> String {
    format!(
        "{}.{}.test-signature",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

pub fn token_expiring_at(exp: i64, subject: &str) -> String {
    token_with_claims(json!({ "sub": subject, "exp": exp }))
}

/// Valid for another hour
pub fn valid_token() -> String {
    token_expiring_at(NOW + 3600, "alice")
}

/// Inside the five minute refresh buffer
pub fn expiring_token() -> String {
    token_expiring_at(NOW + 60, "alice")
}

pub fn expired_token() -> String {
    token_expiring_at(NOW - 60, "alice")
}

/// Token a refresh hands back
pub fn fresh_token() -> String {
    token_expiring_at(NOW + 900, "alice-refreshed")
}

/// Page double that records what the guard asked of it
#[derive(Default)]
pub struct RecordingPage {
    referrer: Mutex<Option<String>>,
    navigations: Mutex<Vec<String>>,
    notices: Mutex<Vec<Notice>>,
}

impl RecordingPage {
    pub fn set_referrer(&self, referrer: &str) {
        *self.referrer.lock().unwrap() = Some(referrer.to_string());
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl PageContext for RecordingPage {
    fn referrer(&self) -> Option<String> {
        self.referrer.lock().unwrap().clone()
    }

    fn navigate(&self, route: &str) {
        self.navigations.lock().unwrap().push(route.to_string());
    }

    fn notify(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}

/// A guard wired to a mock backend, in-memory storage and a manual clock
pub struct Harness {
    pub server: MockServer,
    pub clock: Arc<ManualClock>,
    pub persistent: Arc<MemoryStore>,
    pub transient: Arc<MemoryStore>,
    pub page: Arc<RecordingPage>,
    pub guard: SessionGuard,
}

impl Harness {
    pub async fn start() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(tweak: impl FnOnce(&mut SessionConfig)) -> Self {
        Self::with_parts(tweak, Arc::new(MemoryStore::new())).await
    }

    /// Persistent storage capped at `quota_bytes`
    pub async fn with_storage_quota(quota_bytes: usize) -> Self {
        Self::with_parts(|_| {}, Arc::new(MemoryStore::with_quota(quota_bytes))).await
    }

    async fn with_parts(
        tweak: impl FnOnce(&mut SessionConfig),
        persistent: Arc<MemoryStore>,
    ) -> Self {
        let server = MockServer::start().await;

        let mut config = SessionConfig::with_base_url(server.uri());
        config.success_redirect_delay_ms = 0;
        tweak(&mut config);

        let clock = Arc::new(ManualClock::at_timestamp(NOW));
        let transient = Arc::new(MemoryStore::new());
        let page = Arc::new(RecordingPage::default());

        let guard = SessionGuard::builder(config)
            .persistent_store(persistent.clone())
            .transient_store(transient.clone())
            .clock(clock.clone())
            .page(page.clone())
            .build()
            .expect("guard should build");

        Self {
            server,
            clock,
            persistent,
            transient,
            page,
            guard,
        }
    }

    /// Seed storage as a previous login would have left it
    pub fn store_session(&self, access_token: &str, refresh_token: Option<&str>, remember_me: bool) {
        self.persistent.set(ACCESS_TOKEN_KEY, access_token).unwrap();
        if let Some(refresh_token) = refresh_token {
            self.persistent.set(REFRESH_TOKEN_KEY, refresh_token).unwrap();
        }
        self.persistent.set(USERNAME_KEY, "alice").unwrap();
        self.persistent
            .set(REMEMBER_ME_KEY, if remember_me { "true" } else { "false" })
            .unwrap();
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.persistent.get(key)
    }

    pub async fn requests_to(&self, path: &str) -> Vec<wiremock::Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == path)
            .collect()
    }
}
