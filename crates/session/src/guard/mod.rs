//! The session guard
//!
//! One [`SessionGuard`] per page owns the access-token lifecycle. It is a
//! cheap handle (`Clone`) around shared state so background refreshes and
//! concurrent requests all observe the same single-flight refresh slot.

mod login;
mod request;

pub use login::{LoginForm, LoginPageOutcome};
pub use request::ApiRequest;

use crate::claims::{TokenState, decode_claims};
use crate::clock::{Clock, SystemClock};
use crate::config::{RefreshCarrier, SessionConfig};
use crate::error::{SessionError, SessionResult};
use crate::login_attempts::LoginAttemptTracker;
use crate::page::{Notice, NoticeLevel, PageContext};
use crate::redirect_loop::RedirectLoopDetector;
use crate::session::{Session, SessionStore};
use crate::storage::{KeyValueStore, StorageError};
use console_http::types::RefreshResponse;
use console_http::{ClientError, PublicConsoleClient, TypedClientBuilder};
use reqwest::{Response, StatusCode, header};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Transient-store key holding a notice for the next page
const PENDING_NOTICE_KEY: &str = "sessionNotice";

/// Result of one refresh negotiation, shared by every caller that waited on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new access token is stored
    Refreshed,
    /// Nothing to refresh with; no request was made
    MissingToken,
    /// The server rejected the refresh token (401); session cleared
    Rejected,
    /// The server reported refresh token reuse (403); session cleared
    Reused,
    /// No usable answer (network, 5xx, malformed body); session kept
    Unavailable(String),
}

impl RefreshOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, Self::Refreshed)
    }

    /// Error reported to callers that needed the refresh to succeed
    fn into_error(self) -> SessionError {
        match self {
            Self::Refreshed | Self::Unavailable(_) => SessionError::TokenExpired,
            Self::MissingToken | Self::Rejected => SessionError::RefreshFailed,
            Self::Reused => SessionError::RefreshTokenReused,
        }
    }
}

#[derive(Default)]
struct RefreshSlot {
    last: Option<RefreshOutcome>,
}

struct GuardInner {
    config: SessionConfig,
    client: PublicConsoleClient,
    session: SessionStore,
    transient: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    page: Arc<dyn PageContext>,
    redirects: RedirectLoopDetector,
    attempts: LoginAttemptTracker,
    refresh: Mutex<RefreshSlot>,
    /// Bumped each time a refresh completes; lets waiters detect that the
    /// flight they queued behind has already landed
    refresh_generation: AtomicU64,
    refresh_attempts: AtomicU32,
    /// Set once a session-ending redirect has been issued; callers that
    /// shared the same failed refresh then stay quiet
    login_redirect_pending: AtomicBool,
}

/// Client-side authentication and session guard
#[derive(Clone)]
pub struct SessionGuard {
    inner: Arc<GuardInner>,
}

/// Builder wiring storage, clock and page into a [`SessionGuard`]
pub struct SessionGuardBuilder {
    config: SessionConfig,
    persistent: Option<Arc<dyn KeyValueStore>>,
    transient: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn Clock>>,
    page: Option<Arc<dyn PageContext>>,
}

impl SessionGuardBuilder {
    /// Store that keeps the session across page loads (`localStorage`)
    pub fn persistent_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.persistent = Some(store);
        self
    }

    /// Per-tab store for short-lived state (`sessionStorage`)
    pub fn transient_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.transient = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn page(mut self, page: Arc<dyn PageContext>) -> Self {
        self.page = Some(page);
        self
    }

    /// Validate the configuration and assemble the guard
    pub fn build(self) -> SessionResult<SessionGuard> {
        #[cfg(not(target_arch = "wasm32"))]
        let config = self.config;
        #[cfg(target_arch = "wasm32")]
        let config = defaults::with_window_origin(self.config)?;
        config.validate()?;

        let client = TypedClientBuilder::new()
            .base_url(config.base_url.clone())
            .endpoints(config.endpoints.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build_public()
            .map_err(|e| SessionError::Configuration(e.to_string()))?;

        let persistent = self.persistent.unwrap_or_else(defaults::persistent_store);
        let transient = self.transient.unwrap_or_else(defaults::transient_store);
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let page = self.page.unwrap_or_else(defaults::page);

        let redirects =
            RedirectLoopDetector::new(transient.clone(), clock.clone(), config.redirect_loop);
        let attempts =
            LoginAttemptTracker::new(persistent.clone(), clock.clone(), config.login_attempts);

        debug!(
            base_url = %config.base_url,
            carrier = ?config.refresh_carrier,
            "session guard ready"
        );

        Ok(SessionGuard {
            inner: Arc::new(GuardInner {
                session: SessionStore::new(persistent),
                transient,
                clock,
                page,
                redirects,
                attempts,
                client,
                config,
                refresh: Mutex::new(RefreshSlot::default()),
                refresh_generation: AtomicU64::new(0),
                refresh_attempts: AtomicU32::new(0),
                login_redirect_pending: AtomicBool::new(false),
            }),
        })
    }
}

mod defaults {
    use crate::page::PageContext;
    use crate::storage::KeyValueStore;
    use std::sync::Arc;

    #[cfg(not(target_arch = "wasm32"))]
    pub fn persistent_store() -> Arc<dyn KeyValueStore> {
        Arc::new(crate::storage::MemoryStore::new())
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn transient_store() -> Arc<dyn KeyValueStore> {
        Arc::new(crate::storage::MemoryStore::new())
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn page() -> Arc<dyn PageContext> {
        Arc::new(crate::page::LoggingPage)
    }

    #[cfg(target_arch = "wasm32")]
    pub fn persistent_store() -> Arc<dyn KeyValueStore> {
        Arc::new(crate::storage::BrowserStore::local())
    }

    #[cfg(target_arch = "wasm32")]
    pub fn transient_store() -> Arc<dyn KeyValueStore> {
        Arc::new(crate::storage::BrowserStore::session())
    }

    #[cfg(target_arch = "wasm32")]
    pub fn page() -> Arc<dyn PageContext> {
        Arc::new(crate::page::BrowserPage)
    }

    /// An empty base URL means "same origin as the page"
    #[cfg(target_arch = "wasm32")]
    pub fn with_window_origin(
        mut config: crate::config::SessionConfig,
    ) -> crate::error::SessionResult<crate::config::SessionConfig> {
        if config.base_url.trim().is_empty() {
            config.base_url = web_sys::window()
                .and_then(|window| window.location().origin().ok())
                .ok_or_else(|| {
                    crate::error::SessionError::Configuration("no window origin".into())
                })?;
        }
        Ok(config)
    }
}

impl SessionGuard {
    pub fn builder(config: SessionConfig) -> SessionGuardBuilder {
        SessionGuardBuilder {
            config,
            persistent: None,
            transient: None,
            clock: None,
            page: None,
        }
    }

    /// Guard over `localStorage`, `sessionStorage` and the current window
    #[cfg(target_arch = "wasm32")]
    pub fn for_browser(config: SessionConfig) -> SessionResult<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// What is currently stored for the user
    pub fn session(&self) -> Session {
        self.inner.session.snapshot()
    }

    pub fn username(&self) -> Option<String> {
        self.inner.session.username()
    }

    pub fn token_state(&self) -> TokenState {
        TokenState::assess(
            self.inner.session.access_token().as_deref(),
            self.inner.clock.now(),
            self.inner.config.refresh_buffer(),
        )
    }

    /// Local check only; the server may still reject the token
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self.token_state(),
            TokenState::Valid | TokenState::ExpiringSoon
        )
    }

    /// Remaining lifetime of the stored access token
    pub fn time_until_expiry(&self) -> Option<chrono::Duration> {
        let token = self.inner.session.access_token()?;
        let claims = decode_claims(&token).ok()?;
        Some(claims.time_until_expiry(self.inner.clock.now()))
    }

    /// Notice left behind by the page that navigated here, if any
    pub fn take_pending_notice(&self) -> Option<Notice> {
        let raw = self.inner.transient.get(PENDING_NOTICE_KEY)?;
        self.inner.transient.remove(PENDING_NOTICE_KEY);
        serde_json::from_str(&raw).ok()
    }

    /// Obtain a new access token, collapsing concurrent calls into one request
    pub async fn refresh_access_token(&self) -> RefreshOutcome {
        let inner = &self.inner;
        let observed = inner.refresh_generation.load(Ordering::Acquire);

        let mut slot = inner.refresh.lock().await;
        if inner.refresh_generation.load(Ordering::Acquire) != observed {
            if let Some(outcome) = slot.last.clone() {
                debug!(?outcome, "joined in-flight token refresh");
                return outcome;
            }
        }

        let outcome = self.perform_refresh().await;
        slot.last = Some(outcome.clone());
        inner.refresh_generation.fetch_add(1, Ordering::Release);
        outcome
    }

    async fn perform_refresh(&self) -> RefreshOutcome {
        let inner = &self.inner;

        let attempts = inner.refresh_attempts.load(Ordering::Relaxed);
        if attempts >= inner.config.max_refresh_attempts {
            warn!(attempts, "refresh attempt limit reached");
            inner.refresh_attempts.store(0, Ordering::Relaxed);
            return RefreshOutcome::Unavailable("refresh attempt limit reached".into());
        }

        let body_token = match inner.config.refresh_carrier {
            RefreshCarrier::Storage => match inner.session.refresh_token() {
                Some(token) => Some(token),
                None => {
                    debug!("no refresh token stored");
                    return RefreshOutcome::MissingToken;
                }
            },
            // The cookie is invisible to us; a stored session is the best hint it exists
            RefreshCarrier::Cookie if inner.session.snapshot().is_empty() => {
                debug!("no session to refresh");
                return RefreshOutcome::MissingToken;
            }
            RefreshCarrier::Cookie => None,
        };

        inner.refresh_attempts.fetch_add(1, Ordering::Relaxed);
        debug!("refreshing access token");

        match inner.client.refresh(body_token.as_deref()).await {
            Ok(response) => match self.store_refreshed(&response) {
                Ok(()) => {
                    inner.refresh_attempts.store(0, Ordering::Relaxed);
                    info!("access token refreshed");
                    RefreshOutcome::Refreshed
                }
                Err(e) => {
                    error!(error = %e, "could not persist refreshed token");
                    RefreshOutcome::Unavailable(e.to_string())
                }
            },
            Err(ClientError::Forbidden(_)) => {
                warn!("server reported refresh token reuse; clearing session");
                self.clear_local_session();
                RefreshOutcome::Reused
            }
            Err(ClientError::AuthenticationFailed(_)) => {
                info!("refresh token rejected; clearing session");
                self.clear_local_session();
                RefreshOutcome::Rejected
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed; keeping session");
                RefreshOutcome::Unavailable(e.to_string())
            }
        }
    }

    /// Only the access token write is fatal; once it lands the refresh counts
    fn store_refreshed(&self, response: &RefreshResponse) -> Result<(), StorageError> {
        let session = &self.inner.session;
        session.set_access_token(&response.access_token)?;

        if self.inner.config.refresh_carrier == RefreshCarrier::Storage {
            if let Some(rotated) = &response.refresh_token {
                if let Err(e) = session.set_refresh_token(rotated) {
                    error!(error = %e, "could not store rotated refresh token");
                }
            }
        }

        if let Some(remember_me) = decode_claims(&response.access_token)
            .ok()
            .and_then(|claims| claims.remember_me)
        {
            if let Err(e) = session.set_remember_me(remember_me) {
                warn!(error = %e, "could not update remember-me flag");
            }
        }
        Ok(())
    }

    /// Protected-page entry check: make sure a usable access token exists
    ///
    /// Sends the user to the login page when there is none and it cannot be
    /// renewed. A token close to expiry is returned at once while a refresh
    /// runs in the background.
    pub async fn require_auth(&self) -> SessionResult<String> {
        let inner = &self.inner;
        let token = inner.session.access_token();
        if token.is_some() {
            inner.login_redirect_pending.store(false, Ordering::Release);
        }
        let state = TokenState::assess(
            token.as_deref(),
            inner.clock.now(),
            inner.config.refresh_buffer(),
        );

        match (state, token) {
            (TokenState::Valid, Some(token)) => Ok(token),
            (TokenState::ExpiringSoon, Some(token)) => {
                debug!("access token expiring soon; refreshing in background");
                self.spawn_background_refresh();
                Ok(token)
            }
            (TokenState::Expired, _) => {
                info!("access token expired; refreshing before request");
                match self.refresh_access_token().await {
                    RefreshOutcome::Refreshed => {
                        inner.session.access_token().ok_or(SessionError::NoToken)
                    }
                    // Session kept; the caller may retry once the network is back
                    RefreshOutcome::Unavailable(reason) => {
                        warn!(%reason, "could not renew expired access token");
                        Err(SessionError::TokenExpired)
                    }
                    outcome => Err(self.end_session(outcome.into_error())),
                }
            }
            _ => Err(self.end_session(SessionError::NoToken)),
        }
    }

    fn spawn_background_refresh(&self) {
        let guard = self.clone();
        let task = async move {
            match guard.refresh_access_token().await {
                RefreshOutcome::Refreshed | RefreshOutcome::Unavailable(_) => {}
                outcome => {
                    let _ = guard.end_session(outcome.into_error());
                }
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(_) => warn!("no async runtime; skipping background refresh"),
        }

        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(task);
    }

    /// Send `request` with the current bearer token
    ///
    /// A 401 triggers exactly one refresh and one retry. Transport failures
    /// are returned as [`SessionError::NetworkError`] and leave the session
    /// alone; any other status is handed back to the caller untouched.
    pub async fn authorized_fetch(&self, request: ApiRequest) -> SessionResult<Response> {
        let token = self.require_auth().await?;

        let response = self.send(&request, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        info!(path = %request.path, "request unauthorized; refreshing once");
        match self.refresh_access_token().await {
            RefreshOutcome::Refreshed => {}
            RefreshOutcome::Unavailable(reason) => return Err(SessionError::NetworkError(reason)),
            outcome => return Err(self.end_session(outcome.into_error())),
        }

        let token = self
            .inner
            .session
            .access_token()
            .ok_or(SessionError::NoToken)?;
        let retried = self.send(&request, &token).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!(path = %request.path, "request still unauthorized after refresh");
            return Err(self.end_session(SessionError::RequestUnauthorized));
        }
        Ok(retried)
    }

    /// [`SessionGuard::authorized_fetch`] decoding a JSON success body
    pub async fn authorized_json<T: serde::de::DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> SessionResult<T> {
        let response = self.authorized_fetch(request).await?;
        Ok(console_http::client::typed::read_json(response).await?)
    }

    async fn send(&self, request: &ApiRequest, token: &str) -> SessionResult<Response> {
        let client = self.inner.client.authenticated(token);
        let mut builder = client.request(request.method.clone(), &request.path);

        for (name, value) in &request.headers {
            if name.eq_ignore_ascii_case(header::AUTHORIZATION.as_str()) {
                debug!("ignoring caller supplied authorization header");
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.has_content_type() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        Ok(client.send(builder).await?)
    }

    /// Remove everything stored for the user
    fn clear_local_session(&self) {
        self.inner.session.clear();
        self.inner.refresh_attempts.store(0, Ordering::Relaxed);
    }

    /// Clear the session and send the user to login with an explanation
    fn end_session(&self, error: SessionError) -> SessionError {
        if self.inner.login_redirect_pending.swap(true, Ordering::AcqRel) {
            debug!(%error, "login redirect already under way");
            return error;
        }
        self.clear_local_session();
        let level = match error {
            SessionError::RefreshTokenReused => NoticeLevel::Danger,
            SessionError::NoToken => NoticeLevel::Info,
            _ => NoticeLevel::Warning,
        };
        self.navigate_with_notice(
            &self.inner.config.routes.login,
            Notice::new(level, error.user_message()),
        );
        error
    }

    fn navigate_with_notice(&self, route: &str, notice: Notice) {
        match serde_json::to_string(&notice) {
            Ok(raw) => {
                if let Err(e) = self.inner.transient.set(PENDING_NOTICE_KEY, &raw) {
                    warn!(error = %e, "could not keep notice for next page");
                }
            }
            Err(e) => warn!(error = %e, "could not encode notice"),
        }
        info!(route, "redirecting");
        self.inner.page.navigate(route);
    }
}

/// UX pause (e.g. so a success notice is readable before navigating)
async fn pause(duration: Duration) {
    #[cfg(not(target_arch = "wasm32"))]
    tokio::time::sleep(duration).await;

    #[cfg(target_arch = "wasm32")]
    gloo_timers::future::sleep(duration).await;
}
