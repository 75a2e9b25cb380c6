//! User actions taken on a shown notification, routed back to the provider.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::app::SharedState;
use crate::polling::UpdateProvider;
use crate::services::browser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Open,
    MarkRead,
    Snooze,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [Self::Open, Self::MarkRead, Self::Snooze];

    /// Identifier registered with the notification service.
    pub fn identifier(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::MarkRead => "mark_read",
            Self::Snooze => "snooze",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::MarkRead => "Mark as read",
            Self::Snooze => "Snooze",
        }
    }

    /// `default` is what freedesktop servers report for a click on the body.
    pub fn from_identifier(id: &str) -> Option<Self> {
        match id {
            "open" | "default" => Some(Self::Open),
            "mark_read" => Some(Self::MarkRead),
            "snooze" => Some(Self::Snooze),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAction {
    pub raw_id: String,
    pub url: String,
    pub kind: ActionKind,
}

type UrlOpener = fn(&str) -> Result<(), String>;

/// Executes user actions against the provider.
pub struct ActionRouter {
    provider: Arc<dyn UpdateProvider>,
    open_url: UrlOpener,
}

impl ActionRouter {
    pub fn new(provider: Arc<dyn UpdateProvider>) -> Self {
        Self::with_opener(provider, browser::open_url)
    }

    pub fn with_opener(provider: Arc<dyn UpdateProvider>, open_url: UrlOpener) -> Self {
        Self { provider, open_url }
    }

    /// Carry out one action. Failures are logged, never returned.
    pub async fn handle(&self, action: &UserAction, snooze_for: chrono::Duration) {
        tracing::debug!(id = %action.raw_id, kind = ?action.kind, "Handling notification action");

        match action.kind {
            ActionKind::Open => {
                if let Err(e) = (self.open_url)(&action.url) {
                    tracing::warn!(url = %action.url, "Failed to open notification URL: {e}");
                }
                self.mark_read(&action.raw_id).await;
            }
            ActionKind::MarkRead => self.mark_read(&action.raw_id).await,
            ActionKind::Snooze => {
                let until = Utc::now() + snooze_for;
                match self.provider.snooze(&action.raw_id, until).await {
                    Ok(()) => tracing::info!(id = %action.raw_id, %until, "Notification snoozed"),
                    Err(e) => tracing::warn!(id = %action.raw_id, "Failed to snooze notification: {e}"),
                }
            }
        }
    }

    async fn mark_read(&self, raw_id: &str) {
        match self.provider.mark_as_read(raw_id).await {
            Ok(()) => tracing::debug!(id = %raw_id, "Notification marked as read"),
            Err(e) => tracing::warn!(id = %raw_id, "Failed to mark notification as read: {e}"),
        }
    }
}

/// Drain the action channel until it closes or shutdown is requested.
pub async fn run_action_worker(
    state: SharedState,
    router: ActionRouter,
    mut rx: mpsc::UnboundedReceiver<UserAction>,
) {
    let shutdown_token = state.shutdown_token().clone();
    tracing::info!("Notification action worker started");

    loop {
        let action = tokio::select! {
            _ = shutdown_token.cancelled() => break,
            action = rx.recv() => match action {
                Some(action) => action,
                None => break,
            },
        };
        let snooze_for = state.config().await.snooze_duration();
        router.handle(&action, snooze_for).await;
    }

    tracing::info!("Notification action worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polling::{ProviderError, RawRecord};
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingProvider {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl UpdateProvider for RecordingProvider {
        fn is_authenticated(&self) -> bool {
            true
        }

        async fn get_updates(&self) -> Result<Vec<RawRecord>, ProviderError> {
            Ok(Vec::new())
        }

        async fn mark_as_read(&self, id: &str) -> Result<(), ProviderError> {
            self.calls.lock().unwrap().push(format!("read:{id}"));
            if self.fail {
                return Err(ProviderError::Transport("boom".into()));
            }
            Ok(())
        }

        async fn snooze(&self, id: &str, until: DateTime<Utc>) -> Result<(), ProviderError> {
            let minutes = (until - Utc::now()).num_minutes();
            self.calls.lock().unwrap().push(format!("snooze:{id}:{minutes}"));
            Ok(())
        }
    }

    fn noop_opener(_: &str) -> Result<(), String> {
        Ok(())
    }

    fn failing_opener(_: &str) -> Result<(), String> {
        Err("no browser".into())
    }

    fn action(kind: ActionKind) -> UserAction {
        UserAction {
            raw_id: "n1".into(),
            url: "https://linear.app/acme/issue/ENG-1".into(),
            kind,
        }
    }

    #[test]
    fn identifiers_round_trip() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::from_identifier(kind.identifier()), Some(kind));
        }
        assert_eq!(ActionKind::from_identifier("default"), Some(ActionKind::Open));
        assert_eq!(ActionKind::from_identifier("__closed"), None);
    }

    #[tokio::test]
    async fn open_marks_read_even_if_browser_fails() {
        let provider = Arc::new(RecordingProvider::default());
        let router = ActionRouter::with_opener(provider.clone(), failing_opener);

        router
            .handle(&action(ActionKind::Open), chrono::Duration::minutes(60))
            .await;

        assert_eq!(*provider.calls.lock().unwrap(), vec!["read:n1".to_string()]);
    }

    #[tokio::test]
    async fn snooze_uses_configured_duration() {
        let provider = Arc::new(RecordingProvider::default());
        let router = ActionRouter::with_opener(provider.clone(), noop_opener);

        router
            .handle(&action(ActionKind::Snooze), chrono::Duration::minutes(30))
            .await;

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0] == "snooze:n1:30" || calls[0] == "snooze:n1:29");
    }

    #[tokio::test]
    async fn provider_failures_are_swallowed() {
        let provider = Arc::new(RecordingProvider {
            fail: true,
            ..Default::default()
        });
        let router = ActionRouter::with_opener(provider.clone(), noop_opener);

        router
            .handle(&action(ActionKind::MarkRead), chrono::Duration::minutes(5))
            .await;
        assert_eq!(provider.calls.lock().unwrap().len(), 1);
    }
}
