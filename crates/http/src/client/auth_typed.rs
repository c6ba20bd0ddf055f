//! Type-safe authentication client extensions

use super::{
    error::ClientError,
    typed::{AuthenticatedConsoleClient, PublicConsoleClient},
};
use crate::types::{
    LoginRequest, LoginResponse, LogoutResponse, RefreshRequest, RefreshResponse,
    TokenVerificationResponse,
};

/// Authentication endpoints for public client
impl PublicConsoleClient {
    /// Exchange credentials for an access token (public endpoint)
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ClientError> {
        let req = self
            .request(reqwest::Method::POST, &self.endpoints().login)
            .json(request);
        self.execute(req).await
    }

    /// Obtain a new access token (public endpoint)
    ///
    /// With `Some(token)` the refresh token travels in the JSON body; with
    /// `None` the server is expected to read it from the HttpOnly cookie.
    pub async fn refresh(
        &self,
        refresh_token: Option<&str>,
    ) -> Result<RefreshResponse, ClientError> {
        let mut req = self.request(reqwest::Method::POST, &self.endpoints().refresh);
        if let Some(refresh_token) = refresh_token {
            req = req.json(&RefreshRequest {
                refresh_token: refresh_token.to_string(),
            });
        }
        self.execute(req).await
    }
}

/// Authentication endpoints for authenticated client
impl AuthenticatedConsoleClient {
    /// Ask the server whether the bearer token is still valid
    pub async fn verify(&self) -> Result<TokenVerificationResponse, ClientError> {
        let request = self.request(reqwest::Method::GET, &self.endpoints().verify);
        self.execute(request).await
    }

    /// Revoke the current refresh token on the server
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<LogoutResponse, ClientError> {
        let mut request = self.request(reqwest::Method::POST, &self.endpoints().logout);
        if let Some(refresh_token) = refresh_token {
            request = request.json(&RefreshRequest {
                refresh_token: refresh_token.to_string(),
            });
        }
        self.execute(request).await
    }

    /// Revoke every refresh token of the user on the server
    pub async fn logout_all(
        &self,
        refresh_token: Option<&str>,
    ) -> Result<LogoutResponse, ClientError> {
        let mut request = self.request(reqwest::Method::POST, &self.endpoints().logout_all);
        if let Some(refresh_token) = refresh_token {
            request = request.json(&RefreshRequest {
                refresh_token: refresh_token.to_string(),
            });
        }
        self.execute(request).await
    }
}
