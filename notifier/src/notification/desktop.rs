//! Native desktop notifications via `notify-rust`.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use super::actions::{ActionKind, UserAction};
use super::{NotificationSink, SinkError};
use crate::config::AppConfig;
use crate::polling::CanonicalNotification;

const APP_NAME: &str = "Linear";

/// Per-notification presentation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    pub timeout: Duration,
}

/// A live connection to the platform's notification service.
pub trait NotifierHandle: Send + Sync {
    fn show(
        &self,
        notification: &CanonicalNotification,
        options: &DisplayOptions,
    ) -> Result<(), SinkError>;
}

/// Hands out fresh [`NotifierHandle`]s.
pub trait NotifierBackend: Send + Sync {
    fn create_handle(&self) -> Result<Box<dyn NotifierHandle>, SinkError>;
}

/// Sink that keeps one handle and recreates it once when showing fails.
pub struct DesktopSink {
    backend: Arc<dyn NotifierBackend>,
    handle: Mutex<Option<Box<dyn NotifierHandle>>>,
    enabled: AtomicBool,
    timeout_secs: AtomicU32,
}

impl DesktopSink {
    pub fn new(backend: Arc<dyn NotifierBackend>, config: &AppConfig) -> Self {
        Self {
            backend,
            handle: Mutex::new(None),
            enabled: AtomicBool::new(config.notifications_enabled),
            timeout_secs: AtomicU32::new(config.notification_timeout_secs),
        }
    }

    /// Pick up display settings after a config reload.
    pub fn apply_config(&self, config: &AppConfig) {
        self.enabled
            .store(config.notifications_enabled, Ordering::Relaxed);
        self.timeout_secs
            .store(config.notification_timeout_secs, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn options(&self) -> DisplayOptions {
        DisplayOptions {
            timeout: Duration::from_secs(u64::from(self.timeout_secs.load(Ordering::Relaxed))),
        }
    }
}

impl NotificationSink for DesktopSink {
    fn show_notification(&self, notification: &CanonicalNotification) -> Result<(), SinkError> {
        if !self.is_enabled() {
            tracing::debug!(id = %notification.id, "Notifications disabled, not showing");
            return Ok(());
        }

        let options = self.options();
        let mut slot = self.handle.lock().unwrap_or_else(PoisonError::into_inner);

        let handle = match slot.take() {
            Some(handle) => handle,
            None => self.backend.create_handle()?,
        };

        match handle.show(notification, &options) {
            Ok(()) => {
                *slot = Some(handle);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Notification handle failed, recreating: {e}");
                drop(handle);
                let fresh = self.backend.create_handle()?;
                fresh.show(notification, &options)?;
                *slot = Some(fresh);
                Ok(())
            }
        }
    }
}

/// Backend backed by the OS notification service.
///
/// On freedesktop platforms the chosen action is forwarded on `actions`.
pub struct NotifyRustBackend {
    actions: mpsc::UnboundedSender<UserAction>,
}

impl NotifyRustBackend {
    pub fn new(actions: mpsc::UnboundedSender<UserAction>) -> Self {
        Self { actions }
    }
}

impl NotifierBackend for NotifyRustBackend {
    fn create_handle(&self) -> Result<Box<dyn NotifierHandle>, SinkError> {
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            let info = notify_rust::get_server_information()
                .map_err(|e| SinkError::Unavailable(e.to_string()))?;
            tracing::debug!(server = %info.name, version = %info.version, "Notification server found");
        }

        Ok(Box::new(NotifyRustHandle {
            actions: self.actions.clone(),
        }))
    }
}

struct NotifyRustHandle {
    actions: mpsc::UnboundedSender<UserAction>,
}

impl NotifierHandle for NotifyRustHandle {
    fn show(
        &self,
        notification: &CanonicalNotification,
        options: &DisplayOptions,
    ) -> Result<(), SinkError> {
        let timeout_ms = u32::try_from(options.timeout.as_millis()).unwrap_or(u32::MAX);

        let mut native = notify_rust::Notification::new();
        native
            .summary(&notification.title)
            .body(&notification.body)
            .appname(APP_NAME)
            .timeout(notify_rust::Timeout::Milliseconds(timeout_ms));
        for kind in ActionKind::ALL {
            native.action(kind.identifier(), kind.label());
        }

        #[cfg(all(unix, not(target_os = "macos")))]
        {
            let shown = native
                .show()
                .map_err(|e| SinkError::Show(e.to_string()))?;
            if let Some(raw_id) = notification.raw_id() {
                let raw_id = raw_id.to_string();
                let url = notification.url.clone();
                let tx = self.actions.clone();
                std::thread::spawn(move || {
                    shown.wait_for_action(|action| {
                        let Some(kind) = ActionKind::from_identifier(action) else {
                            return;
                        };
                        let _ = tx.send(UserAction { raw_id, url, kind });
                    });
                });
            }
        }

        #[cfg(not(all(unix, not(target_os = "macos"))))]
        {
            let _ = &self.actions;
            native
                .show()
                .map(|_| ())
                .map_err(|e| SinkError::Show(e.to_string()))?;
        }

        Ok(())
    }
}
