use axum::{
    Router,
    routing::{get, post, put},
};

use super::api;
use crate::app::SharedState;

/// Create the axum router with all routes.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        // --- OAuth ---
        .route("/auth", get(api::auth::auth_redirect))
        .route("/callback", get(api::auth::callback))
        .route("/api/auth/logout", post(api::auth::logout))
        .route("/api/viewer", get(api::auth::viewer))
        // --- Polling ---
        .route("/api/status", get(api::polling::status))
        .route("/api/poll", post(api::polling::poll_now))
        // --- Settings ---
        .route("/api/settings", get(api::settings::get_settings))
        .route("/api/settings/{key}", put(api::settings::update_setting))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support;
    use crate::config::{KEY_CLIENT_ID, KEY_CLIENT_SECRET};
    use crate::services::oauth::run_auth_worker;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::Value;
    use tower::ServiceExt;

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_req(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// State with the OAuth worker running.
    fn state_with_worker() -> SharedState {
        let (state, rx) = test_support::state();
        tokio::spawn(run_auth_worker(state.clone(), rx));
        state
    }

    #[tokio::test]
    async fn status_reports_idle_unauthenticated_daemon() {
        let (state, _rx) = test_support::state();
        let response = create_router(state).oneshot(get_req("/api/status")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["authenticated"], false);
        assert_eq!(body["polling"]["is_polling"], false);
        assert_eq!(body["polling"]["interval_secs"], 60);
        assert_eq!(body["features"]["api_key_configured"], false);
    }

    #[tokio::test]
    async fn settings_listing_masks_secrets() {
        let (state, _rx) = test_support::state();
        state
            .update_setting(KEY_CLIENT_SECRET, "very-secret-value")
            .await
            .unwrap();

        let response = create_router(state).oneshot(get_req("/api/settings")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let secret = &body["settings"][KEY_CLIENT_SECRET];
        assert_eq!(secret["type"], "secret");
        assert_eq!(secret["has_value"], true);
        assert_ne!(secret["value"], "very-secret-value");
    }

    #[tokio::test]
    async fn update_setting_validates_and_applies() {
        let (state, _rx) = test_support::state();
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(json_req("PUT", "/api/settings/POLL_INTERVAL", r#"{"value":"10"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.config().await.poll_interval, 60);

        let response = app
            .clone()
            .oneshot(json_req("PUT", "/api/settings/POLL_INTERVAL", r#"{"value":"120"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.config().await.poll_interval, 120);

        let response = app
            .oneshot(json_req("PUT", "/api/settings/NOT_A_KEY", r#"{"value":"x"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn manual_poll_without_credentials_is_skipped() {
        let (state, _rx) = test_support::state();
        let response = create_router(state)
            .oneshot(json_req("POST", "/api/poll", ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["outcome"], "skipped");
        assert_eq!(body["dispatched"], 0);
    }

    #[tokio::test]
    async fn auth_requires_oauth_app() {
        let state = state_with_worker();
        let response = create_router(state).oneshot(get_req("/auth")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn auth_redirects_to_linear() {
        let state = state_with_worker();
        state
            .update_setting(KEY_CLIENT_ID, "0123456789abcdef0123456789abcdef")
            .await
            .unwrap();
        state.update_setting(KEY_CLIENT_SECRET, "secret").await.unwrap();

        let response = create_router(state).oneshot(get_req("/auth")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("https://linear.app/oauth/authorize?"));
        assert!(location.contains("code_challenge="));
    }

    #[tokio::test]
    async fn callback_with_unknown_state_is_rejected() {
        let state = state_with_worker();
        state
            .update_setting(KEY_CLIENT_ID, "0123456789abcdef0123456789abcdef")
            .await
            .unwrap();
        state.update_setting(KEY_CLIENT_SECRET, "secret").await.unwrap();

        let response = create_router(state)
            .oneshot(get_req("/callback?code=abc&state=forged"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn callback_error_renders_page() {
        let state = state_with_worker();
        let response = create_router(state)
            .oneshot(get_req("/callback?error=access_denied&error_description=%3Cb%3Eno%3C%2Fb%3E"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("access_denied"));
        assert!(html.contains("&lt;b&gt;no&lt;/b&gt;"));
    }

    #[tokio::test]
    async fn callback_without_code_is_rejected() {
        let state = state_with_worker();
        let response = create_router(state)
            .oneshot(get_req("/callback?state=abc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn auth_after_shutdown_is_unavailable() {
        let state = state_with_worker();
        state.close_auth_channel().await;
        let response = create_router(state).oneshot(get_req("/auth")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn viewer_without_credentials_is_unauthorized() {
        let (state, _rx) = test_support::state();
        let response = create_router(state).oneshot(get_req("/api/viewer")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_forgets_tokens() {
        let (state, _rx) = test_support::state();
        let mut events = state.subscribe_settings();
        let response = create_router(state.clone())
            .oneshot(json_req("POST", "/api/auth/logout", ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            events.recv().await.unwrap(),
            crate::config::SettingsEvent::CredentialsChanged
        );
    }
}
