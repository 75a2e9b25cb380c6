//! SettingsManager: DB-backed settings with defaults, migration, and feature status.

use std::collections::HashMap;

use notify_db::Database;
use serde::Serialize;

use super::defaults::DEFAULT_SETTINGS;
use super::validation::validate_setting;
use super::*;

/// Feature availability status.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureStatus {
    pub api_key_configured: bool,
    pub oauth_configured: bool,
    pub missing_settings: Vec<String>,
    pub warnings: Vec<String>,
}

/// Wraps [`Database`] to provide high-level settings operations.
pub struct SettingsManager {
    db: Database,
}

impl SettingsManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get a setting value. Falls back to default if not in DB.
    pub fn get_setting(&self, key: &str) -> Result<String, ConfigError> {
        if let Some(val) = self.db.get_setting(key)? {
            return Ok(val);
        }
        if let Some(def) = DEFAULT_SETTINGS.get(key) {
            return Ok(def.default.to_string());
        }
        Err(ConfigError::UnknownKey(key.to_string()))
    }

    /// Set a setting value with validation. Rejected values leave storage untouched.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let def = DEFAULT_SETTINGS
            .get(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

        validate_setting(key, value).map_err(|message| ConfigError::Validation {
            key: key.to_string(),
            message,
        })?;

        self.db.set_setting(key, value, def.kind())?;
        Ok(())
    }

    /// Set the polling interval in seconds. Values outside 30..=300 are rejected.
    pub fn set_polling_interval(&self, secs: u64) -> Result<(), ConfigError> {
        self.set_setting(KEY_POLL_INTERVAL, &secs.to_string())
    }

    /// Get all settings, filling in defaults for missing keys. Secrets are masked.
    pub fn get_all_settings(&self) -> Result<HashMap<String, SettingInfo>, ConfigError> {
        let db_settings = self.db.get_all_settings()?;
        let mut result = HashMap::new();

        for (key, def) in DEFAULT_SETTINGS.iter() {
            let value = db_settings
                .get(*key)
                .cloned()
                .unwrap_or_else(|| def.default.to_string());
            let has_value = !value.is_empty();
            let (setting_type, shown) = if def.secret {
                (SettingType::Secret, mask_secret(&value))
            } else {
                (SettingType::Normal, value)
            };
            result.insert(
                key.to_string(),
                SettingInfo {
                    key: key.to_string(),
                    value: shown,
                    setting_type,
                    required: def.required,
                    description: def.description.to_string(),
                    has_value,
                },
            );
        }

        Ok(result)
    }

    /// Initialize default settings in DB (skip existing).
    pub fn initialize_defaults(&self) -> Result<(), ConfigError> {
        let inserted = self.db.insert_missing_settings(
            DEFAULT_SETTINGS
                .values()
                .map(|def| (def.key, def.default, def.kind())),
        )?;
        if inserted > 0 {
            tracing::debug!(inserted, "Stored default settings");
        }
        Ok(())
    }

    /// Migrate settings from environment variables to DB (one-time).
    ///
    /// Only keys whose stored value is missing or empty are taken from the
    /// environment, and invalid values are skipped with a warning.
    pub fn migrate_from_env(&self) -> Result<u32, ConfigError> {
        let mut migrated = 0u32;
        for key in DEFAULT_SETTINGS.keys() {
            let stored = self.db.get_setting(key)?;
            if stored.is_some_and(|v| !v.is_empty()) {
                continue;
            }
            let Ok(env_val) = std::env::var(key) else {
                continue;
            };
            if env_val.is_empty() {
                continue;
            }
            match self.set_setting(key, &env_val) {
                Ok(()) => {
                    tracing::info!("Migrated setting from env: {key}");
                    migrated += 1;
                }
                Err(e) => tracing::warn!("Skipping env setting {key}: {e}"),
            }
        }
        if migrated > 0 {
            tracing::info!("Migration completed: {migrated} settings migrated");
            if has_secret_in_env() {
                tracing::warn!(
                    "SECURITY WARNING: Sensitive data in env vars. \
                     Remove from .env after confirming migration."
                );
            }
        }
        Ok(migrated)
    }

    /// Check which credentials are configured.
    pub fn check_feature_status(&self) -> Result<FeatureStatus, ConfigError> {
        let api_key = self.get_setting(KEY_API_KEY)?;
        let client_id = self.get_setting(KEY_CLIENT_ID)?;
        let client_secret = self.get_setting(KEY_CLIENT_SECRET)?;

        let mut status = FeatureStatus {
            api_key_configured: !api_key.is_empty(),
            oauth_configured: !client_id.is_empty() && !client_secret.is_empty(),
            missing_settings: Vec::new(),
            warnings: Vec::new(),
        };

        if !status.api_key_configured && !status.oauth_configured {
            status.missing_settings.push(KEY_API_KEY.into());
            if client_id.is_empty() {
                status.missing_settings.push(KEY_CLIENT_ID.into());
            }
            if client_secret.is_empty() {
                status.missing_settings.push(KEY_CLIENT_SECRET.into());
            }
        }

        if self.get_setting(KEY_NOTIFICATIONS_ENABLED)? != "true" {
            status
                .warnings
                .push("NOTIFICATIONS_ENABLED is false - inbox items are tracked but not shown".into());
        }

        Ok(status)
    }

    pub fn db(&self) -> &Database {
        &self.db
    }
}

fn mask_secret(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let tail: String = value
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{tail}")
}

fn has_secret_in_env() -> bool {
    [KEY_API_KEY, KEY_CLIENT_SECRET]
        .iter()
        .any(|k| std::env::var(k).is_ok_and(|v| !v.is_empty()))
}
