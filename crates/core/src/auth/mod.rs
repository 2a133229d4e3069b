//! Caller identity validation.
//!
//! Every operation except the health check requires a pre-validated caller
//! identity. Token issuance and full identity management live outside this
//! service; the authenticator only checks the credentials attached to a
//! request and produces an [`Identity`] for handlers to consume.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{AuthConfig, AuthMethod};

/// Error type for authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credentials were provided.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Credentials were provided but are wrong.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The authenticator itself is misconfigured.
    #[error("auth configuration error: {0}")]
    Configuration(String),
}

/// A validated caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable caller id.
    pub user_id: String,
    /// Auth method that produced this identity.
    pub method: String,
}

impl Identity {
    /// The identity used when authentication is disabled.
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            method: "none".to_string(),
        }
    }
}

/// The credentials attached to an incoming request.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Request headers, lowercase keys.
    pub headers: HashMap<String, String>,
    /// Source address of the request.
    pub source_ip: IpAddr,
}

/// Trait for authentication backends.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Validate a request's credentials.
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    /// Method name (for logging and the middleware's fast path).
    fn method_name(&self) -> &'static str;
}

/// Authenticator that accepts everything (development / trusted networks).
#[derive(Debug, Default)]
pub struct NoneAuthenticator;

impl NoneAuthenticator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Authenticator for NoneAuthenticator {
    async fn authenticate(&self, _request: &AuthRequest) -> Result<Identity, AuthError> {
        Ok(Identity::anonymous())
    }

    fn method_name(&self) -> &'static str {
        "none"
    }
}

/// Authenticator that validates a shared API key.
///
/// Accepts the key in either `Authorization: Bearer <key>` or
/// `X-API-Key: <key>`.
pub struct ApiKeyAuthenticator {
    expected_key: String,
}

impl ApiKeyAuthenticator {
    pub fn new(api_key: String) -> Self {
        Self {
            expected_key: api_key,
        }
    }

    fn extract_key(request: &AuthRequest) -> Option<&str> {
        if let Some(header) = request.headers.get("authorization") {
            if let Some(key) = header
                .strip_prefix("Bearer ")
                .or_else(|| header.strip_prefix("bearer "))
            {
                return Some(key);
            }
        }
        request.headers.get("x-api-key").map(String::as_str)
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let provided = Self::extract_key(request).ok_or(AuthError::NotAuthenticated)?;

        if constant_time_eq(provided.as_bytes(), self.expected_key.as_bytes()) {
            Ok(Identity {
                user_id: "api_key_user".to_string(),
                method: "api_key".to_string(),
            })
        } else {
            Err(AuthError::InvalidCredentials("invalid API key".to_string()))
        }
    }

    fn method_name(&self) -> &'static str {
        "api_key"
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Create an authenticator from config.
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    match config.method {
        AuthMethod::None => Ok(Box::new(NoneAuthenticator::new())),
        AuthMethod::ApiKey => {
            let api_key = config
                .api_key
                .clone()
                .filter(|key| !key.is_empty())
                .ok_or_else(|| {
                    AuthError::Configuration(
                        "api_key must be set when using the api_key auth method".to_string(),
                    )
                })?;
            Ok(Box::new(ApiKeyAuthenticator::new(api_key)))
        }
    }
}
