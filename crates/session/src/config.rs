//! Session guard configuration

use crate::error::{SessionError, SessionResult};
use console_http::AuthEndpoints;
use serde::{Deserialize, Serialize};

/// Longest accepted refresh buffer
pub const MAX_REFRESH_BUFFER_SECS: u64 = 86_400;

/// Where the refresh token lives between requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshCarrier {
    /// HttpOnly cookie set by the server; script never sees the token
    #[default]
    Cookie,
    /// Returned in response bodies, kept in local storage and posted back
    Storage,
}

/// Pages the guard navigates between
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub login: String,
    pub dashboard: String,
    /// Path prefixes that require a session; a referrer under one of these
    /// marks the stored token as suspect on the login page
    pub protected: Vec<String>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            login: "/ConsoleApp/login".to_string(),
            dashboard: "/ConsoleApp/dashboard".to_string(),
            protected: vec![
                "/ConsoleApp/dashboard".to_string(),
                "/ConsoleApp/projects".to_string(),
                "/ConsoleApp/profile".to_string(),
                "/ConsoleApp/admin".to_string(),
            ],
        }
    }
}

/// Redirect-loop detection on the login page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectLoopConfig {
    pub max_redirects: u32,
    pub timeout_ms: u64,
}

impl Default for RedirectLoopConfig {
    fn default() -> Self {
        Self {
            max_redirects: 3,
            timeout_ms: 5_000,
        }
    }
}

/// Local brute-force throttle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginAttemptConfig {
    pub max_failures: u32,
    pub window_secs: u64,
    pub lockout_secs: u64,
}

impl Default for LoginAttemptConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            window_secs: 60,
            lockout_secs: 15 * 60,
        }
    }
}

/// Main session guard configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Origin of the REST backend; empty means "same origin as the page"
    pub base_url: String,
    pub endpoints: AuthEndpoints,
    pub routes: RouteConfig,
    /// Refresh proactively when less than this much lifetime remains
    pub refresh_buffer_secs: u64,
    pub refresh_carrier: RefreshCarrier,
    /// Consecutive failed refreshes tolerated before failing locally
    pub max_refresh_attempts: u32,
    pub redirect_loop: RedirectLoopConfig,
    pub login_attempts: LoginAttemptConfig,
    /// Pause after a successful login so the welcome notice is seen
    pub success_redirect_delay_ms: u64,
    /// Upper bound for a single request (native targets only)
    pub request_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            endpoints: AuthEndpoints::default(),
            routes: RouteConfig::default(),
            refresh_buffer_secs: 5 * 60,
            refresh_carrier: RefreshCarrier::default(),
            max_refresh_attempts: 3,
            redirect_loop: RedirectLoopConfig::default(),
            login_attempts: LoginAttemptConfig::default(),
            success_redirect_delay_ms: 500,
            request_timeout_secs: 30,
        }
    }
}

impl SessionConfig {
    /// Defaults pointed at `base_url`
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Saturates at [`chrono::Duration::MAX`] for values `validate()` would reject
    pub fn refresh_buffer(&self) -> chrono::Duration {
        i64::try_from(self.refresh_buffer_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Load configuration from file
    ///
    /// Values from the file and from `CONSOLE_*` environment variables
    /// (`__` separates nested keys) are layered over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting configuration fails [`SessionConfig::validate`]
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> SessionResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("CONSOLE").separator("__"))
            .build()
            .map_err(|e| SessionError::Configuration(e.to_string()))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| SessionError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would disable a protection outright
    pub fn validate(&self) -> SessionResult<()> {
        #[cfg(not(target_arch = "wasm32"))]
        if self.base_url.trim().is_empty() {
            return Err(SessionError::Configuration(
                "base_url is required outside the browser".into(),
            ));
        }

        let checks = [
            (self.redirect_loop.max_redirects == 0, "redirect_loop.max_redirects must be > 0"),
            (self.login_attempts.max_failures == 0, "login_attempts.max_failures must be > 0"),
            (self.login_attempts.window_secs == 0, "login_attempts.window_secs must be > 0"),
            (self.login_attempts.lockout_secs == 0, "login_attempts.lockout_secs must be > 0"),
            (self.max_refresh_attempts == 0, "max_refresh_attempts must be > 0"),
            (
                self.refresh_buffer_secs > MAX_REFRESH_BUFFER_SECS,
                "refresh_buffer_secs must not exceed one day",
            ),
            (self.routes.login.is_empty(), "routes.login is required"),
            (self.routes.dashboard.is_empty(), "routes.dashboard is required"),
        ];

        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(SessionError::Configuration((*message).to_string())),
            None => Ok(()),
        }
    }
}
