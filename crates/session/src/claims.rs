//! Access token claim decoding
//!
//! The guard never verifies signatures; it only reads the payload segment to
//! decide when a token must be refreshed. The server remains the authority.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;

/// base64url that tolerates both padded and unpadded segments
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Payload of an access token
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    /// Expiration time (as UTC timestamp)
    pub exp: i64,
    /// Subject (username)
    #[serde(default)]
    pub sub: Option<String>,
    /// Whether the session was created with "remember me", when the issuer says
    #[serde(default)]
    pub remember_me: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimsError {
    #[error("token is not made of three dot-separated segments")]
    Malformed,
    #[error("payload is not valid base64url: {0}")]
    Encoding(String),
    #[error("payload is not a valid claims object: {0}")]
    Payload(String),
}

/// Decode the middle segment of `token` into its claims
pub fn decode_claims(token: &str) -> Result<TokenClaims, ClaimsError> {
    let mut segments = token.split('.');
    let payload = match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
        _ => return Err(ClaimsError::Malformed),
    };

    let bytes = PAYLOAD_ENGINE
        .decode(payload)
        .map_err(|e| ClaimsError::Encoding(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| ClaimsError::Payload(e.to_string()))
}

impl TokenClaims {
    /// Expired once `exp` lies strictly before the current second
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp < now.timestamp()
    }

    /// Remaining lifetime, never negative
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Duration {
        let remaining_ms = self
            .exp
            .saturating_mul(1000)
            .saturating_sub(now.timestamp_millis())
            .max(0);
        Duration::try_milliseconds(remaining_ms).unwrap_or(Duration::MAX)
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.time_until_expiry(now) < buffer
    }
}

/// Unparsable tokens count as expired
pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    decode_claims(token).map_or(true, |claims| claims.is_expired_at(now))
}

/// Where a stored access token stands relative to the refresh buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Missing,
    Expired,
    ExpiringSoon,
    Valid,
}

impl TokenState {
    pub fn assess(token: Option<&str>, now: DateTime<Utc>, refresh_buffer: Duration) -> Self {
        let Some(token) = token else {
            return Self::Missing;
        };

        match decode_claims(token) {
            Err(e) => {
                debug!(error = %e, "stored access token is unreadable; treating as expired");
                Self::Expired
            }
            Ok(claims) if claims.is_expired_at(now) => Self::Expired,
            Ok(claims) if claims.needs_refresh(now, refresh_buffer) => Self::ExpiringSoon,
            Ok(_) => Self::Valid,
        }
    }
}
