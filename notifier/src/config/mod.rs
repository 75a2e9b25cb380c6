//! Configuration management: defaults, validation, loading from DB + environment.

pub mod app_config;
pub mod defaults;
pub mod manager;
pub mod validation;

pub use app_config::AppConfig;
pub use manager::SettingsManager;

use serde::{Deserialize, Serialize};

pub const KEY_API_KEY: &str = "LINEAR_API_KEY";
pub const KEY_CLIENT_ID: &str = "LINEAR_CLIENT_ID";
pub const KEY_CLIENT_SECRET: &str = "LINEAR_CLIENT_SECRET";
pub const KEY_POLL_INTERVAL: &str = "POLL_INTERVAL";
pub const KEY_SNOOZE_MINUTES: &str = "SNOOZE_MINUTES";
pub const KEY_NOTIFICATION_TIMEOUT: &str = "NOTIFICATION_TIMEOUT_SECS";
pub const KEY_NOTIFICATIONS_ENABLED: &str = "NOTIFICATIONS_ENABLED";
pub const KEY_DEBUG_OUTPUT: &str = "DEBUG_OUTPUT";
pub const KEY_SERVER_PORT: &str = "SERVER_PORT";

/// Bounds accepted for `POLL_INTERVAL` at the configuration boundary.
pub const MIN_POLL_INTERVAL_SECS: u64 = 30;
pub const MAX_POLL_INTERVAL_SECS: u64 = 300;

/// Setting type: normal or secret (masked in API responses).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    Normal,
    Secret,
}

/// A setting as returned by the control API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingInfo {
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub setting_type: SettingType,
    pub required: bool,
    pub description: String,
    pub has_value: bool,
}

/// Errors raised at the configuration boundary.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown setting key: {0}")]
    UnknownKey(String),

    #[error("validation error for {key}: {message}")]
    Validation { key: String, message: String },

    #[error("settings storage error: {0}")]
    Storage(#[from] notify_db::DbError),
}

/// What changed, as seen by components that react to settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsEvent {
    IntervalChanged(u64),
    CredentialsChanged,
    VerboseChanged(bool),
    Other(String),
}

impl SettingsEvent {
    /// Map a written key/value pair to the event it should publish.
    pub fn for_key(key: &str, value: &str) -> Self {
        match key {
            KEY_POLL_INTERVAL => value
                .parse()
                .map(Self::IntervalChanged)
                .unwrap_or_else(|_| Self::Other(key.to_string())),
            KEY_API_KEY | KEY_CLIENT_ID | KEY_CLIENT_SECRET => Self::CredentialsChanged,
            KEY_DEBUG_OUTPUT => Self::VerboseChanged(value == "true"),
            _ => Self::Other(key.to_string()),
        }
    }
}
