use std::path::PathBuf;

use notify_db::Database;

use crate::config::{AppConfig, SettingsManager};

/// Foundation init: data dir, database, settings (fatal on error).
pub fn init_foundation() -> Result<(Database, AppConfig, PathBuf), anyhow::Error> {
    load_dotenv();
    let dir = data_dir();
    std::fs::create_dir_all(&dir)?;

    let db_path = dir.join("notify.db");
    tracing::info!("Opening database at {}", db_path.display());
    let db = Database::open(&db_path)?;

    let sm = SettingsManager::new(db.clone());
    match sm.migrate_from_env() {
        Ok(0) => {}
        Ok(n) => tracing::info!("Migrated {n} settings from environment"),
        Err(e) => tracing::error!("Failed to migrate from env: {e}"),
    }
    sm.initialize_defaults()?;

    let config = AppConfig::load(&sm)?;

    if let Ok(status) = sm.check_feature_status() {
        if !status.missing_settings.is_empty() {
            tracing::warn!(
                "Missing settings: {:?}, warnings: {:?}",
                status.missing_settings,
                status.warnings
            );
        } else if !status.warnings.is_empty() {
            tracing::warn!("Settings warnings: {:?}", status.warnings);
        }
    }

    tracing::info!(
        "Settings loaded (port={}, interval={}s)",
        config.server_port,
        config.poll_interval
    );
    Ok((db, config, dir))
}

/// Determine the data directory for the application.
/// Priority: LINEAR_NOTIFY_DATA_DIR env var > ~/.linear-notify
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LINEAR_NOTIFY_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".linear-notify")
}

/// Load .env from multiple candidate paths.
fn load_dotenv() {
    let candidates = [".env", "../.env", "../../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::info!("No .env file found, using system environment variables");
}
