use std::path::PathBuf;
use std::sync::Arc;

use notify_db::Database;
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, ConfigError, SettingsEvent, SettingsManager};
use crate::logging::LogConfig;
use crate::notification::{DesktopSink, NotifierBackend};
use crate::polling::PollingService;
use crate::services::linear_provider::LinearProvider;
use crate::services::oauth::{AUTH_COMMAND_CAPACITY, AuthCommand};

const SETTINGS_EVENT_CAPACITY: usize = 64;

/// Application state shared by the HTTP handlers and background tasks.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<SharedStateInner>,
}

struct SharedStateInner {
    /// Application configuration (reloadable)
    config: RwLock<AppConfig>,
    db: Database,
    data_dir: PathBuf,
    log: LogConfig,
    settings_tx: broadcast::Sender<SettingsEvent>,
    /// `None` once shutdown has closed the channel.
    auth_tx: RwLock<Option<mpsc::Sender<AuthCommand>>>,
    provider: Arc<LinearProvider>,
    sink: Arc<DesktopSink>,
    polling: PollingService,
    shutdown_token: CancellationToken,
}

impl SharedState {
    /// Build the state and its components. The returned receiver feeds the
    /// OAuth worker.
    pub fn new(
        db: Database,
        config: AppConfig,
        data_dir: PathBuf,
        log: LogConfig,
        backend: Arc<dyn NotifierBackend>,
    ) -> (Self, mpsc::Receiver<AuthCommand>) {
        let (settings_tx, _) = broadcast::channel(SETTINGS_EVENT_CAPACITY);
        let (auth_tx, auth_rx) = mpsc::channel(AUTH_COMMAND_CAPACITY);

        let provider = Arc::new(LinearProvider::new(db.clone(), &config));
        let sink = Arc::new(DesktopSink::new(backend, &config));
        let polling = PollingService::new(
            provider.clone(),
            sink.clone(),
            config.poll_interval,
            log.clone(),
        );

        let state = Self {
            inner: Arc::new(SharedStateInner {
                config: RwLock::new(config),
                db,
                data_dir,
                log,
                settings_tx,
                auth_tx: RwLock::new(Some(auth_tx)),
                provider,
                sink,
                polling,
                shutdown_token: CancellationToken::new(),
            }),
        };
        (state, auth_rx)
    }

    pub fn server_port(&self) -> u16 {
        self.inner
            .config
            .try_read()
            .map(|c| c.server_port)
            .unwrap_or(AppConfig::default().server_port)
    }

    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.inner.data_dir
    }

    pub fn log(&self) -> &LogConfig {
        &self.inner.log
    }

    pub fn provider(&self) -> &Arc<LinearProvider> {
        &self.inner.provider
    }

    pub fn sink(&self) -> &Arc<DesktopSink> {
        &self.inner.sink
    }

    pub fn polling(&self) -> &PollingService {
        &self.inner.polling
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown_token
    }

    /// Get a read lock on the current config.
    pub async fn config(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.config.read().await
    }

    /// Reload config from the database.
    pub async fn reload_config(&self) -> Result<(), ConfigError> {
        let sm = SettingsManager::new(self.inner.db.clone());
        let mut config = self.inner.config.write().await;
        config.reload(&sm)?;
        Ok(())
    }

    pub fn subscribe_settings(&self) -> broadcast::Receiver<SettingsEvent> {
        self.inner.settings_tx.subscribe()
    }

    pub fn publish_settings_event(&self, event: SettingsEvent) {
        tracing::debug!(?event, "Settings event");
        // No subscribers is fine, e.g. before the watcher starts.
        let _ = self.inner.settings_tx.send(event);
    }

    /// Validate and store one setting, reload the config, and announce it.
    pub async fn update_setting(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let sm = SettingsManager::new(self.inner.db.clone());
        sm.set_setting(key, value)?;
        self.reload_config().await?;
        self.publish_settings_event(SettingsEvent::for_key(key, value));
        Ok(())
    }

    /// Forget stored OAuth tokens.
    pub async fn logout(&self) -> Result<(), ConfigError> {
        let removed = self.inner.db.delete_all_tokens()?;
        tracing::info!(removed, "OAuth tokens deleted");
        self.publish_settings_event(SettingsEvent::CredentialsChanged);
        Ok(())
    }

    pub async fn auth_sender(&self) -> Option<mpsc::Sender<AuthCommand>> {
        self.inner.auth_tx.read().await.clone()
    }

    /// Drop the command sender so the OAuth worker winds down.
    pub async fn close_auth_channel(&self) -> bool {
        self.inner.auth_tx.write().await.take().is_some()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KEY_POLL_INTERVAL, KEY_SNOOZE_MINUTES};

    #[tokio::test]
    async fn update_setting_reloads_and_publishes() {
        let (state, _rx) = test_support::state();
        let mut events = state.subscribe_settings();

        state.update_setting(KEY_POLL_INTERVAL, "45").await.unwrap();
        assert_eq!(state.config().await.poll_interval, 45);
        assert_eq!(events.recv().await.unwrap(), SettingsEvent::IntervalChanged(45));

        state.update_setting(KEY_SNOOZE_MINUTES, "15").await.unwrap();
        assert_eq!(state.config().await.snooze_minutes, 15);
        assert_eq!(
            events.recv().await.unwrap(),
            SettingsEvent::Other(KEY_SNOOZE_MINUTES.into())
        );
    }

    #[tokio::test]
    async fn rejected_setting_publishes_nothing() {
        let (state, _rx) = test_support::state();
        let mut events = state.subscribe_settings();

        assert!(state.update_setting(KEY_POLL_INTERVAL, "10").await.is_err());
        assert_eq!(state.config().await.poll_interval, 60);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn auth_channel_closes_once() {
        let (state, _rx) = test_support::state();
        assert!(state.auth_sender().await.is_some());
        assert!(state.close_auth_channel().await);
        assert!(!state.close_auth_channel().await);
        assert!(state.auth_sender().await.is_none());
    }
}
