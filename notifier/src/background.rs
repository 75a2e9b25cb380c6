//! Background task loops: OAuth token refresh and settings change handling.

use std::time::Duration;

use linear_client::auth::LinearAuth;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::app::SharedState;
use crate::config::SettingsEvent;
use crate::services::linear_provider::{load_token, save_token};

const CHECK_INTERVAL_SECS: u64 = 10 * 60;
const REFRESH_WINDOW_SECS: i64 = 30 * 60;
const INITIAL_BACKOFF_SECS: u64 = 30;
const MAX_BACKOFF_SECS: u64 = 30 * 60;

async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => true,
        _ = sleep(duration) => false,
    }
}

/// What one refresh check did.
#[derive(Debug, PartialEq, Eq)]
enum RefreshOutcome {
    /// No token, no OAuth app, or the token is not close to expiry.
    Idle,
    Refreshed,
    Failed(String),
}

/// Periodically refresh the stored OAuth token before it expires.
pub async fn token_refresh_loop(state: SharedState) {
    let shutdown_token = state.shutdown_token().clone();

    // Wait for initial startup
    if sleep_or_cancel(&shutdown_token, Duration::from_secs(10)).await {
        tracing::info!("Token refresh loop stopped (shutdown)");
        return;
    }
    let mut failure_backoff_secs = INITIAL_BACKOFF_SECS;

    loop {
        let wait = match refresh_once(&state, None).await {
            RefreshOutcome::Failed(e) => {
                tracing::error!("Token auto-refresh failed: {e}");
                tracing::warn!(
                    retry_after_secs = failure_backoff_secs,
                    "Retrying token refresh with exponential backoff"
                );
                let wait = failure_backoff_secs;
                failure_backoff_secs = (failure_backoff_secs * 2).min(MAX_BACKOFF_SECS);
                wait
            }
            RefreshOutcome::Refreshed | RefreshOutcome::Idle => {
                failure_backoff_secs = INITIAL_BACKOFF_SECS;
                CHECK_INTERVAL_SECS
            }
        };

        if sleep_or_cancel(&shutdown_token, Duration::from_secs(wait)).await {
            tracing::info!("Token refresh loop stopped (shutdown)");
            return;
        }
    }
}

async fn refresh_once(state: &SharedState, token_url: Option<&str>) -> RefreshOutcome {
    let token = match load_token(state.db()) {
        Ok(Some(t)) => t,
        Ok(None) => return RefreshOutcome::Idle,
        Err(e) => return RefreshOutcome::Failed(format!("failed to load token: {e}")),
    };

    let time_until_expiry = token.expires_at - chrono::Utc::now().timestamp();
    if time_until_expiry > REFRESH_WINDOW_SECS || token.refresh_token.is_empty() {
        return RefreshOutcome::Idle;
    }

    let mut auth = {
        let config = state.config().await;
        if !config.oauth_configured() {
            return RefreshOutcome::Idle;
        }
        LinearAuth::new(
            config.client_id.clone(),
            config.client_secret.clone(),
            config.redirect_uri(),
        )
    };
    if let Some(url) = token_url {
        auth = auth.with_token_url(url);
    }

    tracing::info!(time_until_expiry, "Token expiring soon or expired, refreshing");
    let new_token = match auth.refresh_token(&token.refresh_token).await {
        Ok(t) => t,
        Err(e) => return RefreshOutcome::Failed(e.to_string()),
    };
    if let Err(e) = save_token(state.db(), &new_token) {
        return RefreshOutcome::Failed(format!("failed to save refreshed token: {e}"));
    }

    tracing::info!(expires_at = new_token.expires_at, "Token auto-refreshed successfully");
    state.publish_settings_event(SettingsEvent::CredentialsChanged);
    RefreshOutcome::Refreshed
}

/// Apply settings changes to the running components.
pub async fn settings_watch_loop(state: SharedState) {
    let shutdown_token = state.shutdown_token().clone();
    let mut events = state.subscribe_settings();

    loop {
        let event = tokio::select! {
            _ = shutdown_token.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(event) => apply_settings_event(&state, event).await,
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Settings watcher lagged, resynchronizing");
                resync(&state).await;
            }
            Err(RecvError::Closed) => break,
        }
    }

    tracing::info!("Settings watcher stopped");
}

async fn apply_settings_event(state: &SharedState, event: SettingsEvent) {
    match event {
        SettingsEvent::IntervalChanged(secs) => {
            tracing::info!(interval_secs = secs, "Polling interval changed, restarting");
            state.polling().set_interval_secs(secs);
            state.polling().restart().await;
        }
        SettingsEvent::CredentialsChanged => {
            tracing::info!("Credentials changed, restarting polling");
            state.provider().apply_config(&*state.config().await);
            state.polling().restart().await;
        }
        SettingsEvent::VerboseChanged(verbose) => {
            state.log().set_verbose(verbose);
        }
        SettingsEvent::Other(key) => {
            tracing::debug!(%key, "Setting changed");
            state.sink().apply_config(&*state.config().await);
        }
    }
}

async fn resync(state: &SharedState) {
    let (interval, verbose) = {
        let config = state.config().await;
        state.provider().apply_config(&config);
        state.sink().apply_config(&config);
        (config.poll_interval, config.debug_output)
    };
    state.log().set_verbose(verbose);
    state.polling().set_interval_secs(interval);
    state.polling().restart().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support;
    use crate::config::{KEY_CLIENT_ID, KEY_CLIENT_SECRET, KEY_DEBUG_OUTPUT, KEY_NOTIFICATIONS_ENABLED};
    use linear_client::Token;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token(expires_in: i64) -> Token {
        Token {
            access_token: "old".into(),
            refresh_token: "refresh".into(),
            scope: "read,write".into(),
            expires_at: chrono::Utc::now().timestamp() + expires_in,
        }
    }

    async fn configure_oauth(state: &SharedState) {
        state
            .update_setting(KEY_CLIENT_ID, "0123456789abcdef0123456789abcdef")
            .await
            .unwrap();
        state.update_setting(KEY_CLIENT_SECRET, "secret").await.unwrap();
    }

    #[tokio::test]
    async fn refresh_is_idle_without_token_or_far_from_expiry() {
        let (state, _rx) = test_support::state();
        assert_eq!(refresh_once(&state, None).await, RefreshOutcome::Idle);

        configure_oauth(&state).await;
        save_token(state.db(), &token(2 * 3600)).unwrap();
        assert_eq!(refresh_once(&state, None).await, RefreshOutcome::Idle);
    }

    #[tokio::test]
    async fn expiring_token_is_refreshed_and_announced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "new",
                "refresh_token": "refresh-2",
                "expires_in": 86399,
                "scope": "read write"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (state, _rx) = test_support::state();
        configure_oauth(&state).await;
        save_token(state.db(), &token(5 * 60)).unwrap();
        let mut events = state.subscribe_settings();

        let url = format!("{}/oauth/token", server.uri());
        assert_eq!(refresh_once(&state, Some(&url)).await, RefreshOutcome::Refreshed);

        let stored = load_token(state.db()).unwrap().unwrap();
        assert_eq!(stored.access_token, "new");
        assert_eq!(stored.refresh_token, "refresh-2");
        assert_eq!(events.recv().await.unwrap(), SettingsEvent::CredentialsChanged);
    }

    #[tokio::test]
    async fn rejected_refresh_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "refresh token revoked"
            })))
            .mount(&server)
            .await;

        let (state, _rx) = test_support::state();
        configure_oauth(&state).await;
        save_token(state.db(), &token(-60)).unwrap();

        let url = format!("{}/oauth/token", server.uri());
        let outcome = refresh_once(&state, Some(&url)).await;
        assert!(matches!(outcome, RefreshOutcome::Failed(ref e) if e.contains("invalid_grant")));
    }

    #[tokio::test]
    async fn settings_events_reach_components() {
        let (state, _rx) = test_support::state();

        state.update_setting(KEY_DEBUG_OUTPUT, "true").await.unwrap();
        apply_settings_event(&state, SettingsEvent::VerboseChanged(true)).await;
        assert!(state.log().is_verbose());

        state
            .update_setting(KEY_NOTIFICATIONS_ENABLED, "false")
            .await
            .unwrap();
        apply_settings_event(&state, SettingsEvent::Other(KEY_NOTIFICATIONS_ENABLED.into())).await;
        assert!(!state.sink().is_enabled());

        apply_settings_event(&state, SettingsEvent::IntervalChanged(90)).await;
        assert_eq!(state.polling().interval_secs(), 90);
        // No credentials, so the restart leaves polling off.
        assert!(!state.polling().is_polling());
    }

    #[tokio::test]
    async fn watcher_exits_on_shutdown() {
        let (state, _rx) = test_support::state();
        let handle = tokio::spawn(settings_watch_loop(state.clone()));
        state.shutdown_token().cancel();
        handle.await.unwrap();
    }
}
