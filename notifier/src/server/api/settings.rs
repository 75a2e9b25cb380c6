//! Settings management API:
//!   GET /api/settings        – all settings (secrets masked) + feature status
//!   PUT /api/settings/{key}  – validate and store one setting

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::app::SharedState;
use crate::config::{ConfigError, SettingsManager};

use super::{ApiResult, err_json};

fn map_config_error(err: ConfigError) -> (axum::http::StatusCode, Json<Value>) {
    match err {
        ConfigError::UnknownKey(_) => err_json(404, &err.to_string()),
        ConfigError::Validation { .. } => err_json(400, &err.to_string()),
        ConfigError::Storage(_) => err_json(500, &err.to_string()),
    }
}

/// GET /api/settings
pub async fn get_settings(State(state): State<SharedState>) -> ApiResult {
    let sm = SettingsManager::new(state.db().clone());

    let all = sm
        .get_all_settings()
        .map_err(|e| err_json(500, &format!("Failed to get settings: {e}")))?;
    let status = sm
        .check_feature_status()
        .map_err(|e| err_json(500, &format!("Failed to check status: {e}")))?;

    Ok(Json(json!({
        "settings": all,
        "status": status,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingBody {
    pub value: String,
}

/// PUT /api/settings/{key}
pub async fn update_setting(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Json(body): Json<UpdateSettingBody>,
) -> ApiResult {
    state
        .update_setting(&key, &body.value)
        .await
        .map_err(map_config_error)?;
    tracing::info!(%key, "Setting updated via control API");

    let status = SettingsManager::new(state.db().clone())
        .check_feature_status()
        .map_err(|e| err_json(500, &format!("Failed to check status: {e}")))?;

    Ok(Json(json!({
        "success": true,
        "key": key,
        "status": status,
    })))
}
