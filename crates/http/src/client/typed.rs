//! Type-safe API clients that enforce authentication requirements at compile time

use super::{AuthEndpoints, ClientError};
use crate::types::ErrorResponse;
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, header};
use std::time::Duration;

const USER_AGENT: &str = concat!("console-client/", env!("CARGO_PKG_VERSION"));

/// Client for public endpoints that don't require authentication
#[derive(Clone)]
pub struct PublicConsoleClient {
    client: Client,
    base_url: String,
    endpoints: AuthEndpoints,
}

/// Client for endpoints that require a bearer access token
#[derive(Clone)]
pub struct AuthenticatedConsoleClient {
    client: Client,
    base_url: String,
    endpoints: AuthEndpoints,
    access_token: String,
}

fn build_http_client(timeout: Option<Duration>) -> Result<Client, ClientError> {
    #[cfg(not(target_arch = "wasm32"))]
    let client = {
        // Cookie-carried refresh tokens ride on this jar outside the browser
        let mut builder = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .cookie_store(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()?
    };

    #[cfg(target_arch = "wasm32")]
    let client = {
        let _ = (timeout, USER_AGENT); // Timeouts and user agents are not supported on WASM
        ClientBuilder::new().build()?
    };

    Ok(client)
}

/// Join a request path onto the base URL; absolute URLs pass through
fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!("{base_url}{path}")
    }
}

/// Browsers only attach the HttpOnly refresh cookie when credentials are included
fn with_credentials(request: RequestBuilder) -> RequestBuilder {
    #[cfg(target_arch = "wasm32")]
    let request = request.fetch_credentials_include();
    request
}

/// Decode a successful JSON body or map the status to a [`ClientError`]
pub async fn read_json<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, ClientError> {
    let status = response.status();

    if status.is_success() {
        Ok(response.json().await?)
    } else {
        Err(error_from_response(response).await)
    }
}

/// Build a [`ClientError`] from a non-success response, preferring the JSON `message`
pub async fn error_from_response(response: Response) -> ClientError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<ErrorResponse>(&text)
        .ok()
        .and_then(ErrorResponse::into_message)
        .or_else(|| (!text.trim().is_empty()).then(|| text.clone()))
        .unwrap_or_else(|| status.to_string());

    debug!(status = %status, "request rejected by server");
    ClientError::from_status(status, message)
}

impl PublicConsoleClient {
    /// Create a new public client with the default endpoints
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        TypedClientBuilder::new().base_url(base_url).build_public()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the configured endpoint paths
    pub fn endpoints(&self) -> &AuthEndpoints {
        &self.endpoints
    }

    /// Create a request builder without authentication
    pub fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        with_credentials(self.client.request(method, join_url(&self.base_url, path)))
    }

    /// Execute a request and handle common errors
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = request.send().await?;
        read_json(response).await
    }

    /// Derive a client that sends `access_token` as its bearer credential
    pub fn authenticated(&self, access_token: impl Into<String>) -> AuthenticatedConsoleClient {
        AuthenticatedConsoleClient {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            endpoints: self.endpoints.clone(),
            access_token: access_token.into(),
        }
    }
}

impl AuthenticatedConsoleClient {
    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the configured endpoint paths
    pub fn endpoints(&self) -> &AuthEndpoints {
        &self.endpoints
    }

    /// Create a request builder with authentication
    pub fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        with_credentials(self.client.request(method, join_url(&self.base_url, path)))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.access_token))
    }

    /// Send a request and hand back the raw response, whatever its status
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        Ok(request.send().await?)
    }

    /// Execute a request and handle common errors
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = request.send().await?;
        read_json(response).await
    }

    /// Create a public client (useful for calling public endpoints)
    pub fn to_public(&self) -> PublicConsoleClient {
        PublicConsoleClient {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            endpoints: self.endpoints.clone(),
        }
    }
}

/// Type-safe builder that creates the appropriate client type
pub struct TypedClientBuilder {
    base_url: Option<String>,
    endpoints: AuthEndpoints,
    timeout: Option<Duration>,
}

impl TypedClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            base_url: None,
            endpoints: AuthEndpoints::default(),
            timeout: None,
        }
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Override the authentication endpoint paths
    pub fn endpoints(mut self, endpoints: AuthEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Set the request timeout (ignored on WASM)
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build a public client
    pub fn build_public(self) -> Result<PublicConsoleClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        Ok(PublicConsoleClient {
            client: build_http_client(self.timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoints: self.endpoints,
        })
    }

    /// Build an authenticated client
    pub fn build_authenticated(
        self,
        access_token: impl Into<String>,
    ) -> Result<AuthenticatedConsoleClient, ClientError> {
        Ok(self.build_public()?.authenticated(access_token))
    }
}

impl Default for TypedClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
