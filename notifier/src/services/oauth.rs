//! OAuth authorization-code flow driven over a command channel.
//!
//! The HTTP routes (and the `--login` startup flag) send [`AuthCommand`]s to
//! a single worker that owns the pending flow state.

use std::time::{Duration, Instant};

use linear_client::Token;
use linear_client::auth::{LinearAuth, Pkce};
use tokio::sync::{mpsc, oneshot};

use crate::app::SharedState;
use crate::config::{AppConfig, SettingsEvent};
use crate::services::browser;
use crate::services::linear_provider::save_token;

pub const AUTH_COMMAND_CAPACITY: usize = 8;

/// A started flow is abandoned after this long.
const PENDING_FLOW_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AuthFlowError {
    #[error("OAuth client credentials are not configured")]
    NotConfigured,

    #[error("no authorization is in progress, or the state does not match")]
    StateMismatch,

    #[error("authorization flow expired, start again")]
    Expired,

    #[error("OAuth request failed: {0}")]
    Provider(String),

    #[error("failed to store token: {0}")]
    Storage(String),

    #[error("authorization worker is not running")]
    Unavailable,
}

#[derive(Debug)]
pub enum AuthCommand {
    /// Start a flow; replies with the authorize URL.
    Begin {
        open_browser: bool,
        reply: oneshot::Sender<Result<String, AuthFlowError>>,
    },
    /// Finish a flow with the code from the redirect.
    Complete {
        code: String,
        state: String,
        reply: oneshot::Sender<Result<(), AuthFlowError>>,
    },
}

struct PendingFlow {
    state: String,
    verifier: String,
    started: Instant,
}

/// Holds at most one in-progress authorization.
#[derive(Default)]
pub struct OAuthFlow {
    pending: Option<PendingFlow>,
}

impl OAuthFlow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new flow, replacing any pending one.
    pub fn begin(&mut self, auth: &LinearAuth) -> Result<String, AuthFlowError> {
        let state = uuid::Uuid::new_v4().simple().to_string();
        let pkce = Pkce::generate();
        let url = auth
            .get_auth_url(&state, &pkce.challenge)
            .map_err(|e| AuthFlowError::Provider(e.to_string()))?;

        self.pending = Some(PendingFlow {
            state,
            verifier: pkce.verifier,
            started: Instant::now(),
        });
        Ok(url)
    }

    /// Exchange `code` if `state` matches the pending flow. The pending flow
    /// is consumed either way.
    pub async fn complete(
        &mut self,
        auth: &LinearAuth,
        code: &str,
        state: &str,
    ) -> Result<Token, AuthFlowError> {
        let pending = match self.pending.take() {
            Some(p) if p.state == state => p,
            other => {
                self.pending = other;
                return Err(AuthFlowError::StateMismatch);
            }
        };
        if pending.started.elapsed() > PENDING_FLOW_TTL {
            return Err(AuthFlowError::Expired);
        }

        auth.exchange_code(code, &pending.verifier)
            .await
            .map_err(|e| AuthFlowError::Provider(e.to_string()))
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

fn auth_from_config(config: &AppConfig) -> Result<LinearAuth, AuthFlowError> {
    if !config.oauth_configured() {
        return Err(AuthFlowError::NotConfigured);
    }
    Ok(LinearAuth::new(
        config.client_id.clone(),
        config.client_secret.clone(),
        config.redirect_uri(),
    ))
}

/// Process auth commands until the channel closes or shutdown is requested.
pub async fn run_auth_worker(state: SharedState, mut rx: mpsc::Receiver<AuthCommand>) {
    let shutdown_token = state.shutdown_token().clone();
    let mut flow = OAuthFlow::new();
    tracing::info!("OAuth worker started");

    loop {
        let command = tokio::select! {
            _ = shutdown_token.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            AuthCommand::Begin {
                open_browser,
                reply,
            } => {
                let result = begin(&state, &mut flow, open_browser).await;
                let _ = reply.send(result);
            }
            AuthCommand::Complete {
                code,
                state: flow_state,
                reply,
            } => {
                let result = complete(&state, &mut flow, &code, &flow_state).await;
                let _ = reply.send(result);
            }
        }
    }

    tracing::info!("OAuth worker stopped");
}

async fn begin(
    state: &SharedState,
    flow: &mut OAuthFlow,
    open_browser: bool,
) -> Result<String, AuthFlowError> {
    let auth = auth_from_config(&*state.config().await)?;
    let url = flow.begin(&auth)?;
    tracing::info!("OAuth authorization started");

    if open_browser {
        let target = url.clone();
        match tokio::task::spawn_blocking(move || browser::open_url(&target)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Could not open browser, visit {url} manually: {e}"),
            Err(e) => tracing::warn!("Browser task failed: {e}"),
        }
    }
    Ok(url)
}

async fn complete(
    state: &SharedState,
    flow: &mut OAuthFlow,
    code: &str,
    flow_state: &str,
) -> Result<(), AuthFlowError> {
    let auth = auth_from_config(&*state.config().await)?;
    let token = flow.complete(&auth, code, flow_state).await?;
    save_token(state.db(), &token).map_err(|e| AuthFlowError::Storage(e.to_string()))?;
    tracing::info!(expires_at = token.expires_at, "OAuth token saved");

    state.publish_settings_event(SettingsEvent::CredentialsChanged);
    Ok(())
}

/// Ask the worker to start a flow.
pub async fn request_begin(state: &SharedState, open_browser: bool) -> Result<String, AuthFlowError> {
    let tx = state.auth_sender().await.ok_or(AuthFlowError::Unavailable)?;
    let (reply, rx) = oneshot::channel();
    tx.send(AuthCommand::Begin {
        open_browser,
        reply,
    })
    .await
    .map_err(|_| AuthFlowError::Unavailable)?;
    rx.await.map_err(|_| AuthFlowError::Unavailable)?
}

/// Ask the worker to finish a flow.
pub async fn request_complete(
    state: &SharedState,
    code: String,
    flow_state: String,
) -> Result<(), AuthFlowError> {
    let tx = state.auth_sender().await.ok_or(AuthFlowError::Unavailable)?;
    let (reply, rx) = oneshot::channel();
    tx.send(AuthCommand::Complete {
        code,
        state: flow_state,
        reply,
    })
    .await
    .map_err(|_| AuthFlowError::Unavailable)?;
    rx.await.map_err(|_| AuthFlowError::Unavailable)?
}
