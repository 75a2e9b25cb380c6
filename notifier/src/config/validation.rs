//! Setting value validation.

use regex::Regex;
use std::sync::LazyLock;

use super::*;

static RE_API_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^lin_api_[A-Za-z0-9]{16,}$").unwrap());
static RE_CLIENT_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9A-Fa-f]{32}$").unwrap());

/// Validate a setting value. Returns `Ok(())` if valid, or an error message.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    match key {
        KEY_API_KEY => {
            if !value.is_empty() && !RE_API_KEY.is_match(value) {
                return Err("expected a personal API key starting with 'lin_api_'".into());
            }
        }
        KEY_CLIENT_ID => {
            if !value.is_empty() && !RE_CLIENT_ID.is_match(value) {
                return Err("expected a 32 character hexadecimal client ID".into());
            }
        }
        KEY_POLL_INTERVAL => validate_int_range(
            value,
            MIN_POLL_INTERVAL_SECS as i64,
            MAX_POLL_INTERVAL_SECS as i64,
        )?,
        KEY_SNOOZE_MINUTES => validate_int_range(value, 5, 1440)?,
        KEY_NOTIFICATION_TIMEOUT => validate_int_range(value, 1, 60)?,
        KEY_SERVER_PORT => validate_int_range(value, 1024, 65535)?,
        k if is_boolean_setting(k) => {
            if value != "true" && value != "false" {
                return Err("must be 'true' or 'false'".into());
            }
        }
        _ => {}
    }
    Ok(())
}

fn validate_int_range(value: &str, min: i64, max: i64) -> Result<(), String> {
    let v: i64 = value.parse().map_err(|_| "must be an integer")?;
    if v < min || v > max {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(())
}

fn is_boolean_setting(key: &str) -> bool {
    matches!(key, KEY_NOTIFICATIONS_ENABLED | KEY_DEBUG_OUTPUT)
}
