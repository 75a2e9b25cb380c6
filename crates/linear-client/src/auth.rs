//! OAuth token management for Linear authentication.
//!
//! Handles authorize URL generation with PKCE, authorization code exchange,
//! token refresh, and expiry-driven renewal.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::Url;

use crate::{LinearError, SCOPES, Token};

const AUTHORIZE_URL: &str = "https://linear.app/oauth/authorize";
const TOKEN_URL: &str = "https://api.linear.app/oauth/token";

/// Refresh when the token expires within this many seconds.
const REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Scope is returned either as a space/comma separated string or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScopeField {
    List(Vec<String>),
    Joined(String),
}

/// Linear OAuth token response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
    #[serde(default)]
    scope: Option<ScopeField>,
}

/// Linear OAuth error response.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

/// PKCE verifier/challenge pair (S256).
#[derive(Debug, Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    /// Generate a fresh verifier and its S256 challenge.
    pub fn generate() -> Self {
        let verifier = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        let challenge = Self::challenge_for(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    /// base64url(sha256(verifier)) without padding.
    pub fn challenge_for(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }
}

/// Manages Linear OAuth authentication.
///
/// The caller is responsible for persisting tokens.
/// This struct does not depend on notify-db directly.
pub struct LinearAuth {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    authorize_url: String,
    token_url: String,
    http: reqwest::Client,
}

impl LinearAuth {
    /// Create a new auth manager.
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            authorize_url: AUTHORIZE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Override the token endpoint (used against mock servers).
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Generate the OAuth authorization URL with required scopes.
    pub fn get_auth_url(&self, state: &str, code_challenge: &str) -> Result<String, LinearError> {
        let scope_str = SCOPES.join(",");
        let mut url = Url::parse(&self.authorize_url)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &scope_str)
            .append_pair("state", state)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("prompt", "consent");
        Ok(url.to_string())
    }

    /// Exchange an authorization code for access and refresh tokens.
    pub async fn exchange_code(&self, code: &str, verifier: &str) -> Result<Token, LinearError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let resp = self.http.post(&self.token_url).form(&params).send().await?;

        self.parse_token_response(resp, None).await
    }

    /// Refresh an expired token using the refresh token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Token, LinearError> {
        tracing::info!("Refreshing Linear OAuth token");

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let resp = self.http.post(&self.token_url).form(&params).send().await?;

        self.parse_token_response(resp, Some(refresh_token)).await
    }

    /// Get a valid token, refreshing if it expires within 5 minutes.
    ///
    /// Returns `Ok(None)` if refresh is not needed (token is still valid).
    /// Returns `Ok(Some(token))` with the refreshed token if a refresh was performed.
    /// The caller should persist the new token when `Some` is returned.
    pub async fn get_or_refresh_token(&self, current: &Token) -> Result<Option<Token>, LinearError> {
        let now = Utc::now().timestamp();

        if now < current.expires_at - REFRESH_MARGIN_SECS {
            return Ok(None);
        }

        if current.refresh_token.is_empty() {
            return Err(LinearError::AuthRequired);
        }

        tracing::info!(
            expires_in_secs = current.expires_at - now,
            "Token expiring soon, refreshing"
        );

        let new_token = self.refresh_token(&current.refresh_token).await?;
        Ok(Some(new_token))
    }

    /// Parse the token endpoint response into a `Token`.
    ///
    /// Linear may omit the refresh token on refresh; the previous one is kept.
    async fn parse_token_response(
        &self,
        resp: reqwest::Response,
        previous_refresh: Option<&str>,
    ) -> Result<Token, LinearError> {
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let err: ErrorResponse = serde_json::from_str(&body).unwrap_or(ErrorResponse {
                error: Some(status.to_string()),
                error_description: Some(body.clone()),
            });
            return Err(LinearError::TokenRefreshFailed(format!(
                "{}: {}",
                err.error.unwrap_or_default(),
                err.error_description.unwrap_or_default()
            )));
        }

        let token_resp: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            LinearError::TokenRefreshFailed(format!("failed to parse response: {e}"))
        })?;

        let scope = match token_resp.scope {
            Some(ScopeField::List(list)) => list.join(","),
            Some(ScopeField::Joined(s)) => s.replace(' ', ","),
            None => SCOPES.join(","),
        };

        let refresh_token = token_resp
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_string))
            .unwrap_or_default();

        Ok(Token {
            access_token: token_resp.access_token,
            refresh_token,
            scope,
            expires_at: Utc::now().timestamp() + token_resp.expires_in,
        })
    }
}
