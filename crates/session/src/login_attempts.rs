//! Local brute-force throttle for the login form
//!
//! Failures are counted inside a rolling window that opens on the first
//! failure. Hitting the threshold inside that window locks the form for a
//! fixed period. This is defense in depth only; the server enforces its own
//! limit.

use crate::clock::Clock;
use crate::config::LoginAttemptConfig;
use crate::storage::{KeyValueStore, StorageError};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const STATE_KEY: &str = "loginAttempts";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttemptState {
    count: u32,
    window_start_ms: i64,
    #[serde(default)]
    lockout_until_ms: Option<i64>,
}

#[derive(Clone)]
pub struct LoginAttemptTracker {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: LoginAttemptConfig,
}

impl LoginAttemptTracker {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: LoginAttemptConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    fn load(&self) -> AttemptState {
        self.store
            .get(STATE_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    fn persist(&self, state: &AttemptState) -> Result<(), StorageError> {
        let raw =
            serde_json::to_string(state).map_err(|e| StorageError::Backend(e.to_string()))?;
        self.store.set(STATE_KEY, &raw)
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.config.window_secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }

    fn lockout_ms(&self) -> i64 {
        i64::try_from(self.config.lockout_secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }

    /// Time left on an active lockout
    pub fn lockout_remaining(&self) -> Option<Duration> {
        let until = self.load().lockout_until_ms?;
        let remaining = until - self.clock.now().timestamp_millis();
        (remaining > 0).then(|| Duration::milliseconds(remaining))
    }

    /// Whole minutes left on an active lockout, rounded up
    pub fn lockout_minutes_remaining(&self) -> Option<u64> {
        self.lockout_remaining().map(|remaining| {
            let ms = u64::try_from(remaining.num_milliseconds()).unwrap_or(0);
            ms.div_ceil(60_000).max(1)
        })
    }

    pub fn is_locked(&self) -> bool {
        self.lockout_remaining().is_some()
    }

    /// Current failure count inside the open window
    pub fn failure_count(&self) -> u32 {
        self.load().count
    }

    /// Count one failed login; returns whether the form is now locked
    pub fn record_failure(&self) -> Result<bool, StorageError> {
        let now = self.clock.now().timestamp_millis();
        let mut state = self.load();

        let lockout_expired = state.lockout_until_ms.is_some_and(|until| until <= now);
        let window_elapsed = now - state.window_start_ms > self.window_ms();
        if state.count == 0 || lockout_expired || window_elapsed {
            state = AttemptState {
                count: 0,
                window_start_ms: now,
                lockout_until_ms: None,
            };
        }

        state.count = state.count.saturating_add(1);
        if state.count >= self.config.max_failures && state.lockout_until_ms.is_none() {
            state.lockout_until_ms = Some(now.saturating_add(self.lockout_ms()));
            warn!(
                failures = state.count,
                lockout_secs = self.config.lockout_secs,
                "login locked after repeated failures"
            );
        }

        self.persist(&state)?;
        Ok(state.lockout_until_ms.is_some_and(|until| until > now))
    }

    /// Forget all failures (successful login)
    pub fn clear(&self) {
        self.store.remove(STATE_KEY);
    }
}
