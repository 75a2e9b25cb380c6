//! Notification display: the sink consumed by the polling core, the desktop
//! implementation, and routing of user actions back to the provider.

pub mod actions;
pub mod desktop;

pub use actions::{ActionKind, ActionRouter, UserAction};
pub use desktop::{DesktopSink, DisplayOptions, NotifierBackend, NotifierHandle, NotifyRustBackend};

use crate::polling::CanonicalNotification;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("notification service unavailable: {0}")]
    Unavailable(String),

    #[error("failed to show notification: {0}")]
    Show(String),
}

/// Renders canonical notifications.
///
/// Implementations must not panic; failures are returned and logged by the
/// caller, never propagated into the polling loop.
pub trait NotificationSink: Send + Sync {
    fn show_notification(&self, notification: &CanonicalNotification) -> Result<(), SinkError>;
}
