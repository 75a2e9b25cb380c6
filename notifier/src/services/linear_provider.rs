//! [`UpdateProvider`] backed by the Linear GraphQL API.

use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use linear_client::api::{LinearApiClient, MAX_NOTIFICATIONS_PER_PAGE, NotificationNode, Viewer};
use linear_client::auth::LinearAuth;
use linear_client::{Credential, LinearError, Token};
use notify_db::{Database, StoredToken};

use crate::config::AppConfig;
use crate::polling::types::{Actor, IssueRef};
use crate::polling::{ProviderError, RawRecord, UpdateProvider};

/// How far back the first fetch after startup looks.
const INITIAL_LOOKBACK_HOURS: i64 = 1;

/// Credentials and OAuth app settings the provider needs.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub api_key: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl From<&AppConfig> for ProviderSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri(),
        }
    }
}

impl ProviderSettings {
    fn oauth_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

pub struct LinearProvider {
    db: Database,
    client: LinearApiClient,
    token_url: Option<String>,
    settings: RwLock<ProviderSettings>,
    watermark: Mutex<Option<DateTime<Utc>>>,
}

impl LinearProvider {
    pub fn new(db: Database, config: &AppConfig) -> Self {
        Self::with_client(db, config, LinearApiClient::new())
    }

    pub fn with_client(db: Database, config: &AppConfig, client: LinearApiClient) -> Self {
        Self {
            db,
            client,
            token_url: None,
            settings: RwLock::new(ProviderSettings::from(config)),
            watermark: Mutex::new(None),
        }
    }

    /// Override the OAuth token endpoint used for refreshes.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = Some(token_url.into());
        self
    }

    /// Pick up changed credentials after a config reload.
    pub fn apply_config(&self, config: &AppConfig) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) =
            ProviderSettings::from(config);
    }

    /// Lower bound of the next fetch, if one has been made.
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        *self.watermark.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The account the current credential belongs to.
    pub async fn viewer(&self) -> Result<Viewer, ProviderError> {
        let credential = self.credential().await?;
        self.client.viewer(&credential).await.map_err(map_error)
    }

    fn settings(&self) -> ProviderSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resolve the credential for a request, refreshing an OAuth token that
    /// is about to expire.
    async fn credential(&self) -> Result<Credential, ProviderError> {
        let settings = self.settings();
        if !settings.api_key.is_empty() {
            return Ok(Credential::ApiKey(settings.api_key));
        }

        let token = load_token(&self.db)
            .map_err(|e| ProviderError::Transport(format!("failed to load token: {e}")))?
            .ok_or_else(|| ProviderError::Auth("no credential configured".into()))?;

        if !settings.oauth_configured() {
            if token.is_expired() {
                return Err(ProviderError::Auth("OAuth token expired".into()));
            }
            return Ok(Credential::OAuth(token));
        }

        let mut auth = LinearAuth::new(
            settings.client_id,
            settings.client_secret,
            settings.redirect_uri,
        );
        if let Some(url) = &self.token_url {
            auth = auth.with_token_url(url.clone());
        }

        match auth.get_or_refresh_token(&token).await {
            Ok(Some(refreshed)) => {
                if let Err(e) = save_token(&self.db, &refreshed) {
                    tracing::warn!("Failed to persist refreshed token: {e}");
                }
                Ok(Credential::OAuth(refreshed))
            }
            Ok(None) => Ok(Credential::OAuth(token)),
            Err(e) => Err(map_error(e)),
        }
    }
}

#[async_trait]
impl UpdateProvider for LinearProvider {
    fn is_authenticated(&self) -> bool {
        if !self.settings().api_key.is_empty() {
            return true;
        }
        match load_token(&self.db) {
            Ok(Some(token)) => !token.is_expired(),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Failed to read stored token: {e}");
                false
            }
        }
    }

    async fn get_updates(&self) -> Result<Vec<RawRecord>, ProviderError> {
        let started = Utc::now();
        let since = self
            .watermark()
            .unwrap_or_else(|| started - Duration::hours(INITIAL_LOOKBACK_HOURS));

        let credential = self.credential().await?;
        let nodes = self
            .client
            .notifications_since(&credential, since, MAX_NOTIFICATIONS_PER_PAGE)
            .await
            .map_err(map_error)?;

        *self.watermark.lock().unwrap_or_else(PoisonError::into_inner) = Some(started);

        let total = nodes.len();
        let records: Vec<RawRecord> = nodes
            .into_iter()
            .filter(|n| is_actionable(n, started))
            .map(to_raw_record)
            .collect();
        tracing::debug!(total, unread = records.len(), %since, "Fetched inbox");
        Ok(records)
    }

    async fn mark_as_read(&self, id: &str) -> Result<(), ProviderError> {
        let credential = self.credential().await?;
        self.client
            .mark_notification_read(&credential, id, Utc::now())
            .await
            .map_err(map_error)
    }

    async fn snooze(&self, id: &str, until: DateTime<Utc>) -> Result<(), ProviderError> {
        let credential = self.credential().await?;
        self.client
            .snooze_notification(&credential, id, until)
            .await
            .map_err(map_error)
    }
}

/// Already read or currently snoozed items are not announced.
fn is_actionable(node: &NotificationNode, now: DateTime<Utc>) -> bool {
    node.read_at.is_none() && node.snoozed_until_at.is_none_or(|until| until <= now)
}

fn to_raw_record(node: NotificationNode) -> RawRecord {
    let source = match node.typename.as_str() {
        "IssueNotification" => "issue",
        "ProjectNotification" => "project",
        _ => "notification",
    };

    let url = node
        .url
        .or_else(|| node.issue.as_ref().and_then(|i| i.url.clone()))
        .or_else(|| node.project.as_ref().and_then(|p| p.url.clone()));

    RawRecord {
        id: node.id,
        source: source.to_string(),
        kind: node.notification_type,
        created_at: node.created_at,
        title: node.title.or_else(|| node.project.map(|p| p.name)),
        subtitle: node.subtitle,
        url,
        actor: node.actor.map(|a| Actor {
            name: a.display_name.filter(|_| a.name.is_empty()).unwrap_or(a.name),
            avatar_url: a.avatar_url,
        }),
        issue: node.issue.map(|i| IssueRef {
            identifier: i.identifier,
            title: i.title,
            status: i.state.map(|s| s.name),
        }),
        comment: node.comment.map(|c| c.body),
    }
}

fn map_error(e: LinearError) -> ProviderError {
    if e.is_auth_error() {
        return ProviderError::Auth(e.to_string());
    }
    match e {
        LinearError::Json(_) => ProviderError::Malformed(e.to_string()),
        other => ProviderError::Transport(other.to_string()),
    }
}

/// Latest stored OAuth token.
pub(crate) fn load_token(db: &Database) -> Result<Option<Token>, notify_db::DbError> {
    Ok(db.get_latest_token()?.map(|t| Token {
        access_token: t.access_token,
        refresh_token: t.refresh_token,
        scope: t.scope,
        expires_at: t.expires_at,
    }))
}

pub(crate) fn save_token(db: &Database, token: &Token) -> Result<(), notify_db::DbError> {
    db.save_token(&StoredToken {
        access_token: token.access_token.clone(),
        refresh_token: token.refresh_token.clone(),
        scope: token.scope.clone(),
        expires_at: token.expires_at,
        saved_at: 0,
    })
}
