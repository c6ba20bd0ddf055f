//! Redirect-loop detection between the login page and protected pages
//!
//! Every automatic bounce from the login page to the dashboard bumps a
//! counter in the transient (per-tab) store. Reaching the threshold inside
//! the timeout window means a token that looks fine locally keeps being
//! rejected server-side, so the login page should stop redirecting.

use crate::clock::Clock;
use crate::config::RedirectLoopConfig;
use crate::storage::{KeyValueStore, StorageError};
use std::sync::Arc;

const COUNT_KEY: &str = "loginRedirectCount";
const TIMESTAMP_KEY: &str = "loginRedirectTimestamp";

#[derive(Clone)]
pub struct RedirectLoopDetector {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: RedirectLoopConfig,
}

impl RedirectLoopDetector {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: RedirectLoopConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    fn read_u64(&self, key: &str) -> Option<u64> {
        self.store.get(key).and_then(|v| v.parse().ok())
    }

    /// Current count; a stale counter resets itself on read
    pub fn counter(&self) -> u32 {
        let count = self
            .read_u64(COUNT_KEY)
            .and_then(|c| u32::try_from(c).ok())
            .unwrap_or(0);
        if count == 0 {
            return 0;
        }

        let now_ms = self.now_ms();
        let last_ms = self.read_u64(TIMESTAMP_KEY).unwrap_or(0);
        if now_ms.saturating_sub(last_ms) > self.config.timeout_ms {
            debug!("redirect counter window elapsed; resetting");
            self.reset();
            return 0;
        }
        count
    }

    /// Record one automatic redirect away from the login page
    pub fn increment_counter(&self) -> Result<u32, StorageError> {
        let count = self.counter().saturating_add(1);
        self.store.set(COUNT_KEY, &count.to_string())?;
        self.store.set(TIMESTAMP_KEY, &self.now_ms().to_string())?;
        debug!(count, "redirect counter incremented");
        Ok(count)
    }

    pub fn is_in_loop(&self) -> bool {
        self.counter() >= self.config.max_redirects
    }

    pub fn reset(&self) {
        self.store.remove(COUNT_KEY);
        self.store.remove(TIMESTAMP_KEY);
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0)
    }
}

/// Whether `referrer` points at one of the `protected` route prefixes
///
/// Absolute referrers are compared by path; anything that does not parse as
/// a URL is compared as-is.
pub fn was_redirected_from_protected_page(referrer: Option<&str>, protected: &[String]) -> bool {
    let Some(referrer) = referrer.filter(|r| !r.is_empty()) else {
        return false;
    };

    let path = match url::Url::parse(referrer) {
        Ok(url) => url.path().to_string(),
        Err(_) => referrer.to_string(),
    };

    protected.iter().any(|route| path.starts_with(route.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use chrono::Duration;

    fn detector() -> (RedirectLoopDetector, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_timestamp(1_700_000_000));
        let detector = RedirectLoopDetector::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            RedirectLoopConfig::default(),
        );
        (detector, clock)
    }

    #[test]
    fn test_not_in_loop_after_reset() {
        let (detector, _) = detector();
        for _ in 0..3 {
            detector.increment_counter().unwrap();
        }
        assert!(detector.is_in_loop());

        detector.reset();
        assert!(!detector.is_in_loop());
        assert_eq!(detector.counter(), 0);
    }

    #[test]
    fn test_loop_needs_max_increments_within_window() {
        let (detector, clock) = detector();

        detector.increment_counter().unwrap();
        clock.advance(Duration::seconds(1));
        detector.increment_counter().unwrap();
        assert!(!detector.is_in_loop());

        clock.advance(Duration::seconds(1));
        assert_eq!(detector.increment_counter().unwrap(), 3);
        assert!(detector.is_in_loop());
    }

    #[test]
    fn test_counter_resets_after_timeout() {
        let (detector, clock) = detector();
        for _ in 0..3 {
            detector.increment_counter().unwrap();
        }

        clock.advance(Duration::milliseconds(5_001));
        assert!(!detector.is_in_loop());
        assert_eq!(detector.counter(), 0);

        // Fresh window starts from one
        assert_eq!(detector.increment_counter().unwrap(), 1);
    }

    #[test]
    fn test_boundary_of_timeout_window_still_counts() {
        let (detector, clock) = detector();
        for _ in 0..3 {
            detector.increment_counter().unwrap();
        }

        clock.advance(Duration::milliseconds(5_000));
        assert!(detector.is_in_loop());
    }

    #[test]
    fn test_protected_referrer() {
        let protected = crate::config::RouteConfig::default().protected;

        assert!(was_redirected_from_protected_page(
            Some("https://console.example/ConsoleApp/dashboard?tab=1"),
            &protected
        ));
        assert!(was_redirected_from_protected_page(
            Some("/ConsoleApp/projects/42"),
            &protected
        ));
        assert!(!was_redirected_from_protected_page(
            Some("https://console.example/ConsoleApp/login"),
            &protected
        ));
        assert!(!was_redirected_from_protected_page(Some(""), &protected));
        assert!(!was_redirected_from_protected_page(None, &protected));
    }
}
