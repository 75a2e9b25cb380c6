//! Runtime application configuration loaded from DB + environment overrides.

use std::time::Duration;

use super::manager::SettingsManager;
use super::*;

/// Runtime configuration populated from the settings DB.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub client_id: String,
    pub client_secret: String,
    pub poll_interval: u64,
    pub snooze_minutes: i64,
    pub notification_timeout_secs: u32,
    pub notifications_enabled: bool,
    pub debug_output: bool,
    pub server_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            poll_interval: 60,
            snooze_minutes: 60,
            notification_timeout_secs: 8,
            notifications_enabled: true,
            debug_output: false,
            server_port: 8787,
        }
    }
}

impl AppConfig {
    /// Load configuration from the settings manager (DB-first, env overrides).
    pub fn load(sm: &SettingsManager) -> Result<Self, ConfigError> {
        let g = |key: &str| -> String { sm.get_setting(key).unwrap_or_default() };
        let defaults = Self::default();

        let mut server_port = parse_or(&g(KEY_SERVER_PORT), defaults.server_port);
        let mut poll_interval = parse_or(&g(KEY_POLL_INTERVAL), defaults.poll_interval);

        // Environment variable overrides; out-of-range values are ignored.
        if let Ok(v) = std::env::var(KEY_SERVER_PORT) {
            if let Ok(p) = v.parse::<u16>() {
                server_port = p;
            }
        }
        if let Ok(v) = std::env::var(KEY_POLL_INTERVAL) {
            match v.parse::<u64>() {
                Ok(i) if (MIN_POLL_INTERVAL_SECS..=MAX_POLL_INTERVAL_SECS).contains(&i) => {
                    poll_interval = i;
                }
                _ => tracing::warn!("Ignoring invalid {KEY_POLL_INTERVAL} override: {v}"),
            }
        }

        Ok(Self {
            api_key: g(KEY_API_KEY),
            client_id: g(KEY_CLIENT_ID),
            client_secret: g(KEY_CLIENT_SECRET),
            poll_interval,
            snooze_minutes: parse_or(&g(KEY_SNOOZE_MINUTES), defaults.snooze_minutes),
            notification_timeout_secs: parse_or(
                &g(KEY_NOTIFICATION_TIMEOUT),
                defaults.notification_timeout_secs,
            ),
            notifications_enabled: g(KEY_NOTIFICATIONS_ENABLED) != "false",
            debug_output: g(KEY_DEBUG_OUTPUT) == "true",
            server_port,
        })
    }

    /// Reload config from the settings manager.
    pub fn reload(&mut self, sm: &SettingsManager) -> Result<(), ConfigError> {
        *self = Self::load(sm)?;
        Ok(())
    }

    pub fn snooze_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.snooze_minutes)
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.notification_timeout_secs))
    }

    pub fn oauth_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.server_port)
    }
}

fn parse_or<T: std::str::FromStr>(s: &str, default: T) -> T {
    if s.is_empty() {
        return default;
    }
    s.parse().unwrap_or(default)
}
