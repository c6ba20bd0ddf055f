//! Integration tests for the ConsoleApp HTTP client

use console_http::client::{AuthEndpoints, ClientError, PublicConsoleClient, TypedClientBuilder};
use console_http::types::LoginRequest;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn login_request() -> LoginRequest {
    LoginRequest {
        username: "alice".to_string(),
        password: "hunter22".to_string(),
        remember_me: true,
    }
}

#[tokio::test]
async fn test_client_builder() {
    let client = TypedClientBuilder::new()
        .base_url("http://localhost:8080/")
        .build_public();

    assert!(client.is_ok());
    let client = client.unwrap();
    assert_eq!(client.base_url(), "http://localhost:8080");
    assert_eq!(client.endpoints().login, "/api/auth/login");
}

#[tokio::test]
async fn test_client_builder_requires_base_url() {
    let result = TypedClientBuilder::new().build_public();
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_login_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "username": "alice",
            "password": "hunter22",
            "rememberMe": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "header.payload.sig",
            "username": "alice",
            "message": "Login successful"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = PublicConsoleClient::new(mock_server.uri()).unwrap();
    let response = client.login(&login_request()).await.unwrap();

    assert_eq!(response.access_token, "header.payload.sig");
    assert_eq!(response.username, "alice");
    assert!(response.refresh_token.is_none());
}

#[tokio::test]
async fn test_login_error_carries_server_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "Authentication failed",
            "message": "Bad credentials"
        })))
        .mount(&mock_server)
        .await;

    let client = PublicConsoleClient::new(mock_server.uri()).unwrap();
    let result = client.login(&login_request()).await;

    match result {
        Err(ClientError::AuthenticationFailed(message)) => assert_eq!(message, "Bad credentials"),
        other => panic!("expected authentication failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_refresh_sends_body_token_when_given() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(json!({ "refreshToken": "rt-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "new.access.token",
            "refreshToken": "rt-2"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = PublicConsoleClient::new(mock_server.uri()).unwrap();
    let response = client.refresh(Some("rt-1")).await.unwrap();

    assert_eq!(response.access_token, "new.access.token");
    assert_eq!(response.refresh_token.as_deref(), Some("rt-2"));
}

#[tokio::test]
async fn test_refresh_reuse_maps_to_forbidden() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(403).set_body_string("refresh token reuse detected"))
        .mount(&mock_server)
        .await;

    let client = PublicConsoleClient::new(mock_server.uri()).unwrap();
    let err = client.refresh(None).await.unwrap_err();

    assert!(matches!(err, ClientError::Forbidden(_)));
    assert_eq!(err.server_message(), Some("refresh token reuse detected"));
}

#[tokio::test]
async fn test_verify_sends_bearer() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/verify"))
        .and(header("authorization", "Bearer test-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "valid": true,
            "username": "alice",
            "role": "USER"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = TypedClientBuilder::new()
        .base_url(mock_server.uri())
        .build_authenticated("test-access-token")
        .unwrap();

    let response = client.verify().await.unwrap();
    assert!(response.valid);
    assert_eq!(response.role.as_deref(), Some("USER"));
}

#[tokio::test]
async fn test_custom_endpoints() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Logout successful"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let endpoints = AuthEndpoints {
        logout: "/auth/logout".to_string(),
        ..AuthEndpoints::default()
    };
    let client = TypedClientBuilder::new()
        .base_url(mock_server.uri())
        .endpoints(endpoints)
        .build_authenticated("token")
        .unwrap();

    let response = client.logout(None).await.unwrap();
    assert_eq!(response.message.as_deref(), Some("Logout successful"));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Nothing listens on port 9 of the loopback interface
    let client = PublicConsoleClient::new("http://127.0.0.1:9").unwrap();
    let err = client.refresh(None).await.unwrap_err();

    assert!(err.is_transport());
    assert_eq!(err.status(), None);
}
