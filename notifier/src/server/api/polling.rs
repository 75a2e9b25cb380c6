//! Polling status and manual poll trigger.

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::json;

use crate::app::SharedState;
use crate::config::SettingsManager;
use crate::polling::{PollOutcome, UpdateProvider};

use super::{ApiResult, err_json};

/// GET /api/status
pub async fn status(State(state): State<SharedState>) -> ApiResult {
    let features = SettingsManager::new(state.db().clone())
        .check_feature_status()
        .map_err(|e| err_json(500, &format!("Failed to check status: {e}")))?;

    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "authenticated": state.provider().is_authenticated(),
        "notifications_enabled": state.sink().is_enabled(),
        "data_dir": state.data_dir(),
        "polling": state.polling().status(),
        "features": features,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct PollQuery {
    /// Log this cycle at debug level, including raw payloads.
    #[serde(default)]
    pub verbose: bool,
}

/// POST /api/poll – run one cycle now.
pub async fn poll_now(State(state): State<SharedState>, Query(q): Query<PollQuery>) -> ApiResult {
    let _verbose = q.verbose.then(|| state.log().scoped_verbose(true));
    let (outcome, dispatched) = match state.polling().poll().await {
        PollOutcome::Skipped => ("skipped", 0),
        PollOutcome::Failed => ("failed", 0),
        PollOutcome::Dispatched(n) => ("dispatched", n),
    };
    Ok(Json(json!({
        "outcome": outcome,
        "dispatched": dispatched,
    })))
}
