//! Login page flows: entry check, sign-in and sign-out

use super::{RefreshOutcome, SessionGuard, pause};
use crate::claims::TokenState;
use crate::config::RefreshCarrier;
use crate::error::{SessionError, SessionResult};
use crate::page::{Notice, NoticeLevel};
use crate::redirect_loop::was_redirected_from_protected_page;
use crate::session::Session;
use console_http::ClientError;
use console_http::types::LoginRequest;
use std::sync::atomic::Ordering;
use std::time::Duration;

const MIN_USERNAME_LEN: usize = 3;

/// Credentials entered on the login form
#[derive(Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub remember_me: bool,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("remember_me", &self.remember_me)
            .finish()
    }
}

impl LoginForm {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            remember_me: false,
        }
    }

    pub fn remember_me(mut self, remember_me: bool) -> Self {
        self.remember_me = remember_me;
        self
    }

    /// Trimmed username, or the message to show next to the form
    pub fn validate(&self) -> SessionResult<&str> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(SessionError::InvalidInput(
                "Please enter your username".into(),
            ));
        }
        if self.password.is_empty() {
            return Err(SessionError::InvalidInput(
                "Please enter your password".into(),
            ));
        }
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(SessionError::InvalidInput(format!(
                "Username must be at least {MIN_USERNAME_LEN} characters"
            )));
        }
        Ok(username)
    }
}

/// What the login page did on load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPageOutcome {
    /// Nothing stored; show the form
    NoSession,
    /// Too many recent automatic redirects; session cleared, form shown
    RedirectLoopDetected,
    /// Arrived from a protected page, so the stored token was discarded
    ReferredFromProtectedPage,
    /// Session is good; navigated to the dashboard
    RedirectedToDashboard,
    /// Stored session was invalid and has been cleared
    SessionCleared,
    /// Could not verify the session; kept it and showed the form
    ServerUnreachable,
}

impl SessionGuard {
    /// Login page entry check
    ///
    /// Decides whether an existing session should skip the form, without
    /// ever bouncing between the login page and the dashboard forever.
    pub async fn check_existing_auth(&self) -> LoginPageOutcome {
        let inner = &self.inner;

        if let Some(notice) = self.take_pending_notice() {
            inner.page.notify(&notice);
        }

        if inner.redirects.is_in_loop() {
            warn!("redirect loop detected on login page; clearing session");
            self.discard_session(Notice::warning(
                "Your session is invalid. Please login again.",
            ));
            return LoginPageOutcome::RedirectLoopDetected;
        }

        let Some(token) = inner.session.access_token() else {
            debug!("no stored session");
            return LoginPageOutcome::NoSession;
        };

        let referrer = inner.page.referrer();
        if was_redirected_from_protected_page(referrer.as_deref(), &inner.config.routes.protected)
        {
            info!("arrived from a protected page; discarding stored session");
            self.discard_session(Notice::info(
                "Your session has expired. Please login again.",
            ));
            return LoginPageOutcome::ReferredFromProtectedPage;
        }

        let state = TokenState::assess(
            Some(&token),
            inner.clock.now(),
            inner.config.refresh_buffer(),
        );
        let remember_me = inner.session.remember_me();

        if state == TokenState::Expired || (remember_me && state == TokenState::ExpiringSoon) {
            debug!(?state, remember_me, "refreshing before entering the console");
            match self.refresh_access_token().await {
                RefreshOutcome::Refreshed => return self.enter_console(),
                // A still-valid token can be verified as is
                RefreshOutcome::Unavailable(reason) if state != TokenState::Expired => {
                    debug!(%reason, "pre-verify refresh unavailable");
                }
                outcome => {
                    info!(?outcome, "could not renew stored session");
                    let notice = match outcome {
                        RefreshOutcome::Reused => {
                            Notice::danger(SessionError::RefreshTokenReused.user_message())
                        }
                        _ => Notice::info("Your session has expired. Please login again."),
                    };
                    self.discard_session(notice);
                    return LoginPageOutcome::SessionCleared;
                }
            }
        }

        let Some(token) = inner.session.access_token() else {
            return LoginPageOutcome::NoSession;
        };
        match inner.client.authenticated(token).verify().await {
            Ok(verification) if verification.valid => self.enter_console(),
            Ok(_) => {
                info!("server reports stored token invalid");
                self.discard_session(Notice::info(
                    "Your session is no longer valid. Please login again.",
                ));
                LoginPageOutcome::SessionCleared
            }
            Err(e) if e.is_transport() => {
                warn!(error = %e, "could not reach server to verify session");
                LoginPageOutcome::ServerUnreachable
            }
            Err(e) => {
                info!(error = %e, "token verification failed");
                self.discard_session(Notice::info(
                    "Your session is no longer valid. Please login again.",
                ));
                LoginPageOutcome::SessionCleared
            }
        }
    }

    fn enter_console(&self) -> LoginPageOutcome {
        if let Err(e) = self.inner.redirects.increment_counter() {
            warn!(error = %e, "could not record redirect");
        }
        info!("session valid; entering console");
        self.inner.page.navigate(&self.inner.config.routes.dashboard);
        LoginPageOutcome::RedirectedToDashboard
    }

    /// Clear the session while staying on the login page
    fn discard_session(&self, notice: Notice) {
        self.clear_local_session();
        self.inner.redirects.reset();
        self.inner.page.notify(&notice);
    }

    /// Submit the login form
    ///
    /// Locked-out and invalid forms never reach the network. On success the
    /// session is stored and, after a short pause, the page moves on to the
    /// dashboard.
    pub async fn login(&self, form: LoginForm) -> SessionResult<Session> {
        let inner = &self.inner;

        let username = form.validate().map_err(|e| self.report(e))?.to_string();

        if let Some(minutes) = inner.attempts.lockout_minutes_remaining() {
            info!(minutes, "login blocked by local lockout");
            return Err(self.report(SessionError::RateLimited {
                retry_after_minutes: minutes,
            }));
        }

        let request = LoginRequest {
            username,
            password: form.password,
            remember_me: form.remember_me,
        };

        let response = match inner.client.login(&request).await {
            Ok(response) => response,
            Err(e) if e.is_transport() => {
                warn!(error = %e, "login request failed");
                return Err(self.report(e.into()));
            }
            Err(e) => return Err(self.login_failed(e)),
        };

        inner.redirects.reset();
        inner.attempts.clear();

        let session = Session {
            access_token: Some(response.access_token),
            refresh_token: match inner.config.refresh_carrier {
                RefreshCarrier::Storage => response.refresh_token,
                RefreshCarrier::Cookie => None,
            },
            username: Some(response.username),
            remember_me: form.remember_me,
        };
        inner
            .session
            .save(&session)
            .map_err(|e| self.report(e.into()))?;
        inner.refresh_attempts.store(0, Ordering::Relaxed);
        inner.login_redirect_pending.store(false, Ordering::Release);

        let welcome = session.username.as_deref().unwrap_or_default();
        info!(username = welcome, "login successful");
        inner
            .page
            .notify(&Notice::success(format!("Login successful! Welcome {welcome}")));

        pause(Duration::from_millis(inner.config.success_redirect_delay_ms)).await;
        inner.page.navigate(&inner.config.routes.dashboard);
        Ok(session)
    }

    fn login_failed(&self, error: ClientError) -> SessionError {
        let Some(status) = error.status().filter(|s| (400..500).contains(s)) else {
            warn!(error = %error, "login failed on the server side");
            return self.report(error.into());
        };

        match self.inner.attempts.record_failure() {
            Ok(true) => info!(status, "login rejected; form now locked"),
            Ok(false) => info!(status, "login rejected"),
            Err(e) => warn!(error = %e, "could not record failed login"),
        }

        let message = error
            .server_message()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("Login failed. Please check your credentials.")
            .to_string();
        self.report(SessionError::LoginRejected(message))
    }

    /// Show `error` on the current page and hand it back
    fn report(&self, error: SessionError) -> SessionError {
        let level = match error {
            SessionError::InvalidInput(_) | SessionError::RateLimited { .. } => {
                NoticeLevel::Warning
            }
            _ => NoticeLevel::Danger,
        };
        self.inner
            .page
            .notify(&Notice::new(level, error.user_message()));
        error
    }

    /// Sign out of this browser
    ///
    /// The server call is best effort; local state is always cleared.
    pub async fn logout(&self) {
        self.sign_out(false).await;
    }

    /// Revoke every session of the user, then sign out locally
    pub async fn logout_all_devices(&self) {
        self.sign_out(true).await;
    }

    async fn sign_out(&self, everywhere: bool) {
        let inner = &self.inner;
        let session = inner.session.snapshot();

        if let Some(token) = session.access_token {
            let client = inner.client.authenticated(token);
            let refresh_token = session.refresh_token.as_deref();
            let result = if everywhere {
                client.logout_all(refresh_token).await
            } else {
                client.logout(refresh_token).await
            };
            match result {
                Ok(_) => info!(everywhere, "signed out on server"),
                Err(e) => warn!(error = %e, everywhere, "server sign-out failed; clearing locally"),
            }
        }

        self.clear_local_session();
        inner.redirects.reset();

        let message = if everywhere {
            "You have been logged out of all devices."
        } else {
            "You have been logged out."
        };
        self.navigate_with_notice(&inner.config.routes.login, Notice::info(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_validation_messages() {
        assert!(matches!(
            LoginForm::new("   ", "pw").validate(),
            Err(SessionError::InvalidInput(msg)) if msg == "Please enter your username"
        ));
        assert!(matches!(
            LoginForm::new("alice", "").validate(),
            Err(SessionError::InvalidInput(msg)) if msg == "Please enter your password"
        ));
        assert!(matches!(
            LoginForm::new(" al ", "pw").validate(),
            Err(SessionError::InvalidInput(msg)) if msg.contains("at least 3")
        ));
        assert_eq!(LoginForm::new("  alice ", "pw").validate().unwrap(), "alice");
    }

    #[test]
    fn test_debug_hides_password() {
        let rendered = format!("{:?}", LoginForm::new("alice", "hunter2"));
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }
}
