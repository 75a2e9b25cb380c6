use std::time::Duration;

use tokio::time::sleep;

use crate::app::SharedState;

pub async fn graceful_shutdown(state: &SharedState) {
    tracing::info!("Shutdown sequence started");

    state.shutdown_token().cancel();
    tracing::info!("Shutdown: background loops cancelled");

    state.polling().stop();
    tracing::info!("Shutdown: polling stopped");

    if state.close_auth_channel().await {
        tracing::info!("Shutdown: OAuth channel closed");
    }

    sleep(Duration::from_millis(200)).await;
    tracing::info!("Shutdown sequence completed");
}
