//! Polling core: fetch, dedup, normalize, dispatch, reschedule.
//!
//! [`PollingService`] owns a self-renewing one-shot timer. Each firing runs
//! exactly one [`PollingService::poll`] cycle and arms exactly one new timer,
//! so a slow cycle never overlaps the next one. `stop()` cancels the armed
//! timer through its `CancellationToken`; a generation counter makes sure a
//! timer belonging to an earlier `start()` can never re-arm itself.

pub mod normalize;
pub mod provider;
pub mod seen;
pub mod types;

#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::config::MIN_POLL_INTERVAL_SECS;
use crate::logging::LogConfig;
use crate::notification::NotificationSink;

pub use normalize::normalize;
pub use provider::{ProviderError, UpdateProvider};
pub use seen::SeenSet;
pub use types::{CanonicalNotification, NotificationType, RawRecord};

/// Result of one [`PollingService::poll`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Not polling, not authenticated, another cycle in flight, or the
    /// fetched batch was discarded because polling stopped meanwhile.
    Skipped,
    /// The fetch failed; nothing was dispatched.
    Failed,
    /// Number of new notifications handed to the sink.
    Dispatched(usize),
}

/// Snapshot for the control API.
#[derive(Debug, Clone, Serialize)]
pub struct PollingStatus {
    pub is_polling: bool,
    pub interval_secs: u64,
    pub timer_armed: bool,
    pub seen_count: usize,
}

struct TimerHandle {
    cancel: CancellationToken,
    delay: Duration,
}

struct PollingState {
    is_polling: bool,
    timer: Option<TimerHandle>,
    interval_secs: u64,
    generation: u64,
}

#[derive(Clone)]
pub struct PollingService {
    inner: Arc<PollingInner>,
}

struct PollingInner {
    provider: Arc<dyn UpdateProvider>,
    sink: Arc<dyn NotificationSink>,
    log: LogConfig,
    state: Mutex<PollingState>,
    seen: Mutex<SeenSet>,
    cycle: tokio::sync::Mutex<()>,
}

impl PollingService {
    pub fn new(
        provider: Arc<dyn UpdateProvider>,
        sink: Arc<dyn NotificationSink>,
        interval_secs: u64,
        log: LogConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PollingInner {
                provider,
                sink,
                log,
                state: Mutex::new(PollingState {
                    is_polling: false,
                    timer: None,
                    interval_secs,
                    generation: 0,
                }),
                seen: Mutex::new(SeenSet::new()),
                cycle: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Begin polling: one immediate cycle, then the recurring timer.
    ///
    /// Returns whether the service is polling afterwards. Without a usable
    /// credential nothing is armed and `false` is returned.
    pub async fn start(&self) -> bool {
        let generation = {
            let mut state = self.state();
            if state.is_polling {
                return true;
            }
            if !self.inner.provider.is_authenticated() {
                tracing::info!("Not authenticated, polling not started");
                return false;
            }
            state.is_polling = true;
            state.generation += 1;
            state.generation
        };

        tracing::info!(interval_secs = self.interval_secs(), "Polling started");
        self.poll().await;
        self.schedule_next_poll(generation);
        self.is_polling()
    }

    /// Stop polling and cancel the armed timer. Safe to call repeatedly.
    pub fn stop(&self) {
        let mut state = self.state();
        let was_polling = state.is_polling;
        state.is_polling = false;
        if let Some(timer) = state.timer.take() {
            timer.cancel.cancel();
        }
        drop(state);

        if was_polling {
            tracing::info!("Polling stopped");
        }
    }

    /// `stop()` followed by `start()`. Leaves at most one timer armed.
    pub async fn restart(&self) -> bool {
        self.stop();
        self.start().await
    }

    /// Run one fetch cycle.
    pub async fn poll(&self) -> PollOutcome {
        let Ok(_cycle) = self.inner.cycle.try_lock() else {
            tracing::debug!("Poll cycle already in flight, skipping");
            return PollOutcome::Skipped;
        };

        if !self.is_polling() || !self.inner.provider.is_authenticated() {
            return PollOutcome::Skipped;
        }

        let records = match self.inner.provider.get_updates().await {
            Ok(records) => records,
            Err(e) if e.is_auth_failure() => {
                tracing::error!("Authentication rejected, stopping polling: {e}");
                self.stop();
                return PollOutcome::Failed;
            }
            Err(e) => {
                tracing::warn!("Failed to fetch notifications: {e}");
                return PollOutcome::Failed;
            }
        };

        if !self.is_polling() {
            tracing::debug!(
                count = records.len(),
                "Polling stopped during fetch, discarding batch"
            );
            return PollOutcome::Skipped;
        }

        let dispatched = self.dispatch_new(records);
        if dispatched > 0 {
            tracing::info!(count = dispatched, "Dispatched new notifications");
        }
        PollOutcome::Dispatched(dispatched)
    }

    fn dispatch_new(&self, mut records: Vec<RawRecord>) -> usize {
        records.sort_by_key(|r| r.created_at);

        let mut seen = self.inner.seen.lock().unwrap_or_else(PoisonError::into_inner);
        let mut dispatched = 0;

        for record in &records {
            // Also skips repeats within this batch, since ids are added as we go.
            if seen.has(&record.id) {
                continue;
            }

            let notification = normalize(record);
            if self.inner.log.is_verbose() {
                tracing::debug!(
                    id = %notification.id,
                    kind = %record.kind,
                    payload = %serde_json::to_string(&notification).unwrap_or_default(),
                    "Dispatching notification"
                );
            }
            if let Err(e) = self.inner.sink.show_notification(&notification) {
                tracing::warn!(id = %notification.id, "Failed to show notification: {e}");
            }
            seen.add(&record.id);
            dispatched += 1;
        }

        let pruned = seen.prune();
        if pruned > 0 {
            tracing::debug!(pruned, remaining = seen.size(), "Pruned seen set");
        }
        dispatched
    }

    fn schedule_next_poll(&self, generation: u64) {
        let mut state = self.state();
        if !state.is_polling || state.generation != generation || state.timer.is_some() {
            return;
        }

        let delay = Duration::from_secs(state.interval_secs.max(MIN_POLL_INTERVAL_SECS));
        let cancel = CancellationToken::new();
        state.timer = Some(TimerHandle {
            cancel: cancel.clone(),
            delay,
        });
        drop(state);

        let service = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = sleep(delay) => service.on_timer(generation).await,
            }
        });
    }

    async fn on_timer(&self, generation: u64) {
        {
            let mut state = self.state();
            if !state.is_polling || state.generation != generation {
                return;
            }
            state.timer = None;
        }
        self.poll().await;
        self.schedule_next_poll(generation);
    }

    /// Interval used for the next armed timer. Takes effect on restart.
    pub fn set_interval_secs(&self, secs: u64) {
        self.state().interval_secs = secs;
    }

    pub fn interval_secs(&self) -> u64 {
        self.state().interval_secs
    }

    pub fn is_polling(&self) -> bool {
        self.state().is_polling
    }

    /// Delay of the currently armed timer, if any.
    pub fn armed_interval(&self) -> Option<Duration> {
        self.state().timer.as_ref().map(|t| t.delay)
    }

    pub fn seen_count(&self) -> usize {
        self.inner
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .size()
    }

    pub fn status(&self) -> PollingStatus {
        let (is_polling, interval_secs, timer_armed) = {
            let state = self.state();
            (state.is_polling, state.interval_secs, state.timer.is_some())
        };
        PollingStatus {
            is_polling,
            interval_secs,
            timer_armed,
            seen_count: self.seen_count(),
        }
    }

    fn state(&self) -> MutexGuard<'_, PollingState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
