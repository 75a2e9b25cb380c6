//! Notification daemon: polls the Linear inbox and shows desktop notifications.
//!
//! Starts the local control server, background tasks, and signal handling.
//! Pass `--login` to open the browser for OAuth authorization at startup.

use std::sync::Arc;

use tokio::sync::mpsc;

use linear_notify_lib::app::SharedState;
use linear_notify_lib::background;
use linear_notify_lib::logging;
use linear_notify_lib::notification::{ActionRouter, NotifyRustBackend, actions};
use linear_notify_lib::server;
use linear_notify_lib::services::oauth;
use linear_notify_lib::shutdown;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let login = std::env::args().skip(1).any(|a| a == "--login");

    // Tracing; the stored DEBUG_OUTPUT setting is applied once loaded
    let log = logging::init_tracing(std::env::var("DEBUG_OUTPUT").is_ok_and(|v| v == "true"));
    tracing::info!("Starting Linear notifier v{}", env!("CARGO_PKG_VERSION"));

    // Foundation
    let (db, config, dir) = linear_notify_lib::init_foundation()?;
    log.set_verbose(config.debug_output);

    let (action_tx, action_rx) = mpsc::unbounded_channel();
    let backend = Arc::new(NotifyRustBackend::new(action_tx));
    let (state, auth_rx) = SharedState::new(db, config, dir, log, backend);

    // Control server
    let server_state = state.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server::start_server(server_state).await {
            tracing::error!("Server failed: {e}");
        }
    });

    // OAuth worker
    let s = state.clone();
    tokio::spawn(async move { oauth::run_auth_worker(s, auth_rx).await });

    // Notification actions
    let s = state.clone();
    let router = ActionRouter::new(state.provider().clone());
    tokio::spawn(async move { actions::run_action_worker(s, router, action_rx).await });

    // Token auto-refresh
    let s = state.clone();
    tokio::spawn(async move { background::token_refresh_loop(s).await });

    // Settings changes
    let s = state.clone();
    tokio::spawn(async move { background::settings_watch_loop(s).await });

    // Polling
    if !state.polling().start().await {
        tracing::warn!(
            "Polling not started: configure LINEAR_API_KEY or authorize at http://localhost:{}/auth",
            state.server_port()
        );
    }

    if login {
        match oauth::request_begin(&state, true).await {
            Ok(url) => tracing::info!("Complete authorization in the browser: {url}"),
            Err(e) => tracing::error!("Cannot start authorization: {e}"),
        }
    }

    tracing::info!(
        port = state.server_port(),
        "Notifier running. Press Ctrl+C to stop."
    );

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    shutdown::graceful_shutdown(&state).await;
    if let Err(e) = server_handle.await {
        tracing::warn!("Server task ended abnormally: {e}");
    }
    Ok(())
}
