//! Endpoint paths of the authentication API

use serde::{Deserialize, Serialize};

/// Paths of the authentication endpoints, relative to the client base URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEndpoints {
    pub login: String,
    pub refresh: String,
    pub verify: String,
    pub logout: String,
    pub logout_all: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            login: "/api/auth/login".to_string(),
            refresh: "/api/auth/refresh".to_string(),
            verify: "/api/auth/verify".to_string(),
            logout: "/api/auth/logout".to_string(),
            logout_all: "/api/auth/logout-all".to_string(),
        }
    }
}
