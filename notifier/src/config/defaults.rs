//! All setting definitions with their default values.

use std::collections::HashMap;
use std::sync::LazyLock;

use notify_db::SettingKind;

use super::*;

type DefTuple = (&'static str, &'static str, bool, bool, &'static str);

const DEFS: &[DefTuple] = &[
    (
        KEY_API_KEY,
        "",
        true,
        false,
        "Linear personal API key (takes precedence over OAuth)",
    ),
    (KEY_CLIENT_ID, "", true, false, "Linear OAuth application client ID"),
    (
        KEY_CLIENT_SECRET,
        "",
        true,
        false,
        "Linear OAuth application client secret",
    ),
    (
        KEY_POLL_INTERVAL,
        "60",
        false,
        true,
        "Seconds between notification checks (30-300)",
    ),
    (
        KEY_SNOOZE_MINUTES,
        "60",
        false,
        false,
        "Minutes a snoozed notification stays hidden",
    ),
    (
        KEY_NOTIFICATION_TIMEOUT,
        "8",
        false,
        false,
        "Seconds a desktop notification stays on screen",
    ),
    (
        KEY_NOTIFICATIONS_ENABLED,
        "true",
        false,
        false,
        "Show desktop notifications for new inbox items",
    ),
    (KEY_DEBUG_OUTPUT, "false", false, false, "Verbose debug logging"),
    (
        KEY_SERVER_PORT,
        "8787",
        false,
        true,
        "Local port for the OAuth callback and control API",
    ),
];

/// A single setting definition.
#[derive(Debug, Clone)]
pub struct SettingDef {
    pub key: &'static str,
    pub default: &'static str,
    pub secret: bool,
    pub required: bool,
    pub description: &'static str,
}

impl SettingDef {
    pub fn kind(&self) -> SettingKind {
        if self.secret {
            SettingKind::Secret
        } else {
            SettingKind::Normal
        }
    }
}

/// Global setting definitions indexed by key.
pub static DEFAULT_SETTINGS: LazyLock<HashMap<&'static str, SettingDef>> = LazyLock::new(|| {
    DEFS.iter()
        .map(|&(key, default, secret, required, description)| {
            (
                key,
                SettingDef {
                    key,
                    default,
                    secret,
                    required,
                    description,
                },
            )
        })
        .collect()
});

/// Get the default value for a setting key, or `None` if not defined.
pub fn get_default(key: &str) -> Option<&'static str> {
    DEFAULT_SETTINGS.get(key).map(|d| d.default)
}
