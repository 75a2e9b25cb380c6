use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::*;
use crate::{Credential, LinearError};

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    extensions: Option<GraphQlErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorExtensions {
    #[serde(default)]
    code: Option<String>,
}

impl Default for LinearApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearApiClient {
    pub fn new() -> Self {
        Self::with_endpoint(GRAPHQL_URL)
    }

    /// Client against a non-default GraphQL endpoint (mock servers, proxies).
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Build auth headers from the given credential.
    fn auth_headers(&self, credential: &Credential) -> Result<HeaderMap, LinearError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&credential.authorization())
            .map_err(|e| LinearError::InvalidHeader(e.to_string()))?;
        headers.insert(AUTHORIZATION, value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Execute a GraphQL operation and decode its `data` member.
    ///
    /// 401/403 surface as `ApiError`; a non-empty `errors` array surfaces as
    /// `GraphQl` with the first error's code and message.
    pub(super) async fn graphql<T: DeserializeOwned>(
        &self,
        credential: &Credential,
        query: &str,
        variables: Value,
    ) -> Result<T, LinearError> {
        let headers = self.auth_headers(credential)?;
        let body = serde_json::json!({ "query": query, "variables": variables });
        let resp = self
            .http
            .post(&self.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            tracing::warn!(status = status.as_u16(), "Linear rejected credential");
            return Err(LinearError::ApiError {
                status: status.as_u16(),
                message: text,
            });
        }

        // Linear reports GraphQL errors with 400 as well as 200; parse first.
        let parsed: Result<GraphQlResponse<T>, _> = serde_json::from_str(&text);
        match parsed {
            Ok(resp) => {
                if let Some(err) = resp.errors.into_iter().next() {
                    let code = err
                        .extensions
                        .and_then(|e| e.code)
                        .unwrap_or_else(|| "UNKNOWN".to_string());
                    return Err(LinearError::GraphQl {
                        code,
                        message: err.message,
                    });
                }
                if !status.is_success() {
                    return Err(LinearError::ApiError {
                        status: status.as_u16(),
                        message: text,
                    });
                }
                resp.data.ok_or_else(|| LinearError::GraphQl {
                    code: "EMPTY_RESPONSE".into(),
                    message: "response contained neither data nor errors".into(),
                })
            }
            Err(_) if !status.is_success() => Err(LinearError::ApiError {
                status: status.as_u16(),
                message: text,
            }),
            Err(e) => Err(LinearError::Json(e)),
        }
    }
}
