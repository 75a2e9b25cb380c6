//! Linear OAuth endpoints: authorize redirect, callback, viewer, logout.

use axum::Json;
use axum::extract::{Query, State};
use axum::response::{Html, Redirect};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::app::SharedState;
use crate::services::oauth::{self, AuthFlowError};

use super::{ApiResult, err_json};

fn map_flow_error(err: AuthFlowError) -> (axum::http::StatusCode, Json<Value>) {
    let status = match err {
        AuthFlowError::NotConfigured
        | AuthFlowError::StateMismatch
        | AuthFlowError::Expired => 400,
        AuthFlowError::Provider(_) => 502,
        AuthFlowError::Storage(_) => 500,
        AuthFlowError::Unavailable => 503,
    };
    err_json(status, &err.to_string())
}

/// GET /auth – Redirect to Linear OAuth
pub async fn auth_redirect(
    State(state): State<SharedState>,
) -> Result<Redirect, (axum::http::StatusCode, Json<Value>)> {
    let url = oauth::request_begin(&state, false)
        .await
        .map_err(map_flow_error)?;
    Ok(Redirect::temporary(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// GET /callback – Exchange OAuth code for tokens.
pub async fn callback(
    State(state): State<SharedState>,
    Query(q): Query<CallbackQuery>,
) -> Result<Html<String>, (axum::http::StatusCode, Json<Value>)> {
    if let Some(error) = q.error {
        let desc = q.error_description.unwrap_or_default();
        tracing::warn!(%error, "OAuth authorization denied: {desc}");
        return Ok(Html(format!(
            r#"<!DOCTYPE html><html><body><h2>Authorization failed</h2><p>{}: {}</p>
            <script>setTimeout(()=>window.close(),5000)</script></body></html>"#,
            escape_html(&error),
            escape_html(&desc)
        )));
    }
    let code = q
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| err_json(400, "OAuth code missing"))?;
    let flow_state = q
        .state
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err_json(400, "OAuth state missing"))?;

    oauth::request_complete(&state, code, flow_state)
        .await
        .map_err(map_flow_error)?;

    Ok(Html(
        r#"<!DOCTYPE html><html><body>
<h2>Connected to Linear</h2><p>You can close this window.</p>
<script>setTimeout(()=>window.close(),2000)</script></body></html>"#
            .to_string(),
    ))
}

/// GET /api/viewer – the Linear account behind the current credential.
pub async fn viewer(State(state): State<SharedState>) -> ApiResult {
    let viewer = state.provider().viewer().await.map_err(|e| {
        if e.is_auth_failure() {
            err_json(401, &e.to_string())
        } else {
            err_json(502, &e.to_string())
        }
    })?;
    Ok(Json(json!({ "viewer": viewer })))
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<SharedState>) -> ApiResult {
    state
        .logout()
        .await
        .map_err(|e| err_json(500, &format!("Failed to delete tokens: {e}")))?;
    Ok(Json(json!({ "success": true })))
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
