//! Session guard error types

use crate::storage::StorageError;
use console_http::ClientError;
use thiserror::Error;

/// Failures surfaced by [`crate::SessionGuard`]
#[derive(Debug, Error)]
pub enum SessionError {
    /// No access token is stored
    #[error("not signed in")]
    NoToken,

    /// The access token expired and could not be renewed right now
    #[error("access token expired")]
    TokenExpired,

    /// The server rejected the refresh token
    #[error("session refresh failed")]
    RefreshFailed,

    /// The server reported reuse of a rotated refresh token
    #[error("refresh token reuse detected")]
    RefreshTokenReused,

    /// A request was still rejected with 401 after one refresh and retry
    #[error("request unauthorized after retry")]
    RequestUnauthorized,

    /// No response was received
    #[error("network error: {0}")]
    NetworkError(String),

    /// Login is locked locally after too many failures
    #[error("too many failed login attempts; retry in {retry_after_minutes} minute(s)")]
    RateLimited { retry_after_minutes: u64 },

    /// The login page kept bouncing to the dashboard and back
    #[error("redirect loop detected")]
    RedirectLoopDetected,

    /// The server refused the submitted credentials
    #[error("login rejected: {0}")]
    LoginRejected(String),

    /// Form input failed local validation
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Non-authentication failure reported by the server
    #[error(transparent)]
    Client(ClientError),

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

impl From<ClientError> for SessionError {
    fn from(error: ClientError) -> Self {
        if error.is_transport() {
            Self::NetworkError(error.to_string())
        } else {
            Self::Client(error)
        }
    }
}

impl SessionError {
    /// Whether the guard wiped the stored session before returning this error
    pub fn clears_session(&self) -> bool {
        matches!(
            self,
            Self::NoToken
                | Self::RefreshFailed
                | Self::RefreshTokenReused
                | Self::RequestUnauthorized
                | Self::RedirectLoopDetected
        )
    }

    /// Text suitable for an alert on the page
    pub fn user_message(&self) -> String {
        match self {
            Self::NoToken => "Please log in to continue.".to_string(),
            Self::TokenExpired => {
                "Your session has expired and could not be renewed. Check your connection and try again."
                    .to_string()
            }
            Self::RefreshFailed => "Your session has expired. Please log in again.".to_string(),
            Self::RefreshTokenReused => {
                "Security alert: your session was used elsewhere. Please log in again.".to_string()
            }
            Self::RequestUnauthorized => {
                "You are no longer authorized. Please log in again.".to_string()
            }
            Self::NetworkError(_) => {
                "Unable to reach the server. Please check your connection.".to_string()
            }
            Self::RateLimited {
                retry_after_minutes,
            } => format!(
                "Too many failed login attempts. Please try again in {retry_after_minutes} minute(s)."
            ),
            Self::RedirectLoopDetected => {
                "Redirect loop detected. Please log in again.".to_string()
            }
            Self::LoginRejected(message) | Self::InvalidInput(message) => message.clone(),
            Self::Storage(StorageError::QuotaExceeded) => {
                "Browser storage is full. Free some space and try again.".to_string()
            }
            Self::Storage(_) => "Browser storage is unavailable.".to_string(),
            Self::Client(e) => e
                .server_message()
                .map(str::to_string)
                .unwrap_or_else(|| "An unexpected error occurred. Please try again.".to_string()),
            Self::Configuration(_) => "The application is misconfigured.".to_string(),
        }
    }
}
