//! Linear integration client library.
//!
//! Provides OAuth authentication (authorization code + PKCE) and a
//! GraphQL API client for the notification inbox.

pub mod api;
pub mod auth;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Token data for OAuth authentication.
///
/// The caller is responsible for persisting this (e.g. via notify-db).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    pub expires_at: i64,
}

impl Token {
    /// Whether the access token is past its expiry time.
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.expires_at
    }
}

/// Credential used to authorize API requests.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Personal API key, sent verbatim in the `Authorization` header.
    ApiKey(String),
    /// OAuth access token, sent as a Bearer token.
    OAuth(Token),
}

impl Credential {
    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        match self {
            Self::ApiKey(key) => key.clone(),
            Self::OAuth(token) => format!("Bearer {}", token.access_token),
        }
    }
}

/// Unified error type for the linear-client crate.
#[derive(Debug, thiserror::Error)]
pub enum LinearError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authentication required: no valid token")]
    AuthRequired,

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Linear API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("GraphQL error ({code}): {message}")]
    GraphQl { code: String, message: String },

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Message fragments that identify a rejected or expired credential.
const AUTH_MESSAGE_PATTERNS: &[&str] = &[
    "unauthorized",
    "not authenticated",
    "authentication",
    "invalid token",
    "invalid_token",
    "expired",
];

impl LinearError {
    /// Whether the error means the current credential is unusable.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::AuthRequired => true,
            Self::ApiError { status: 401 | 403, .. } => true,
            Self::GraphQl { code, message } => {
                code == "AUTHENTICATION_ERROR" || is_auth_message(message)
            }
            Self::TokenRefreshFailed(message) => is_auth_message(message),
            _ => false,
        }
    }
}

/// Case-insensitive check for auth failure wording.
pub fn is_auth_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    AUTH_MESSAGE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// OAuth scopes required by this application.
pub const SCOPES: &[&str] = &["read", "write"];
