use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use notify_db::Database;

use super::*;
use crate::config::{AppConfig, ConfigError, SettingsManager};
use crate::notification::SinkError;

struct FakeProvider {
    authenticated: AtomicBool,
    batches: Mutex<VecDeque<Result<Vec<RawRecord>, ProviderError>>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl FakeProvider {
    fn new(authenticated: bool) -> Arc<Self> {
        Arc::new(Self {
            authenticated: AtomicBool::new(authenticated),
            batches: Mutex::new(VecDeque::new()),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    fn push(&self, batch: Result<Vec<RawRecord>, ProviderError>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpdateProvider for FakeProvider {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn get_updates(&self) -> Result<Vec<RawRecord>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn mark_as_read(&self, _id: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn snooze(&self, _id: &str, _until: DateTime<Utc>) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSink {
    shown: Mutex<Vec<CanonicalNotification>>,
    fail: AtomicBool,
}

impl RecordingSink {
    fn raw_ids(&self) -> Vec<String> {
        self.shown
            .lock()
            .unwrap()
            .iter()
            .filter_map(|n| n.raw_id().map(str::to_string))
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn show_notification(&self, notification: &CanonicalNotification) -> Result<(), SinkError> {
        self.shown.lock().unwrap().push(notification.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::Show("display gone".into()));
        }
        Ok(())
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn rec(id: &str, ts: i64) -> RawRecord {
    RawRecord::new(id, "issueAssignedToYou", at(ts))
}

fn service(provider: &Arc<FakeProvider>, sink: &Arc<RecordingSink>, interval: u64) -> PollingService {
    PollingService::new(
        provider.clone(),
        sink.clone(),
        interval,
        LogConfig::detached(false),
    )
}

#[tokio::test(start_paused = true)]
async fn second_poll_dispatches_only_new_records() {
    let provider = FakeProvider::new(true);
    let sink = Arc::new(RecordingSink::default());
    let svc = service(&provider, &sink, 60);

    provider.push(Ok(vec![rec("a", 1), rec("b", 2)]));
    assert!(svc.start().await);
    assert_eq!(sink.raw_ids(), vec!["a", "b"]);
    assert_eq!(svc.seen_count(), 2);

    provider.push(Ok(vec![rec("b", 2), rec("c", 3)]));
    assert_eq!(svc.poll().await, PollOutcome::Dispatched(1));
    assert_eq!(sink.raw_ids(), vec!["a", "b", "c"]);
    assert_eq!(svc.seen_count(), 3);

    svc.stop();
}

#[tokio::test(start_paused = true)]
async fn repeated_batch_dispatches_nothing() {
    let provider = FakeProvider::new(true);
    let sink = Arc::new(RecordingSink::default());
    let svc = service(&provider, &sink, 60);

    provider.push(Ok(vec![rec("a", 1), rec("b", 2)]));
    svc.start().await;
    provider.push(Ok(vec![rec("a", 1), rec("b", 2)]));
    assert_eq!(svc.poll().await, PollOutcome::Dispatched(0));
    assert_eq!(sink.shown.lock().unwrap().len(), 2);

    svc.stop();
}

#[tokio::test(start_paused = true)]
async fn batch_is_dispatched_oldest_first() {
    let provider = FakeProvider::new(true);
    let sink = Arc::new(RecordingSink::default());
    let svc = service(&provider, &sink, 60);

    provider.push(Ok(vec![rec("t3", 3), rec("t1", 1), rec("t2", 2), rec("t1", 1)]));
    svc.start().await;

    let shown = sink.shown.lock().unwrap();
    let stamps: Vec<_> = shown.iter().map(|n| n.timestamp).collect();
    assert_eq!(stamps, vec![at(1), at(2), at(3)]);
    assert_eq!(shown[0].id, "notification-t1");
}

#[tokio::test(start_paused = true)]
async fn start_without_credentials_arms_nothing() {
    let provider = FakeProvider::new(false);
    let sink = Arc::new(RecordingSink::default());
    let svc = service(&provider, &sink, 60);

    assert!(!svc.start().await);
    assert!(!svc.is_polling());
    assert_eq!(svc.armed_interval(), None);
    assert_eq!(provider.calls(), 0);
    assert_eq!(svc.poll().await, PollOutcome::Skipped);
}

#[tokio::test(start_paused = true)]
async fn unauthorized_fetch_stops_polling() {
    let provider = FakeProvider::new(true);
    let sink = Arc::new(RecordingSink::default());
    let svc = service(&provider, &sink, 60);

    provider.push(Err(ProviderError::Transport(
        "HTTP 401: unauthorized".into(),
    )));
    assert!(!svc.start().await);
    assert!(!svc.is_polling());
    assert_eq!(svc.armed_interval(), None);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn auth_failure_on_timer_tick_stops_polling() {
    let provider = FakeProvider::new(true);
    let sink = Arc::new(RecordingSink::default());
    let svc = service(&provider, &sink, 30);

    svc.start().await;
    provider.push(Err(ProviderError::Auth("token expired".into())));

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(provider.calls(), 2);
    assert!(!svc.is_polling());
    assert_eq!(svc.armed_interval(), None);
}

#[tokio::test(start_paused = true)]
async fn transport_errors_keep_polling() {
    let provider = FakeProvider::new(true);
    let sink = Arc::new(RecordingSink::default());
    let svc = service(&provider, &sink, 60);

    provider.push(Err(ProviderError::Transport("connection reset".into())));
    provider.push(Err(ProviderError::Malformed("missing field `nodes`".into())));
    assert!(svc.start().await);
    assert_eq!(svc.armed_interval(), Some(Duration::from_secs(60)));

    assert_eq!(svc.poll().await, PollOutcome::Failed);
    assert!(svc.is_polling());
    assert!(sink.shown.lock().unwrap().is_empty());

    svc.stop();
}

#[tokio::test(start_paused = true)]
async fn sink_failures_do_not_stop_the_cycle() {
    let provider = FakeProvider::new(true);
    let sink = Arc::new(RecordingSink::default());
    sink.fail.store(true, Ordering::SeqCst);
    let svc = service(&provider, &sink, 60);

    provider.push(Ok(vec![rec("a", 1), rec("b", 2)]));
    svc.start().await;

    assert_eq!(sink.shown.lock().unwrap().len(), 2);
    assert_eq!(svc.seen_count(), 2);
    assert!(svc.is_polling());

    svc.stop();
}

#[tokio::test(start_paused = true)]
async fn timer_fires_once_per_interval() {
    let provider = FakeProvider::new(true);
    let sink = Arc::new(RecordingSink::default());
    let svc = service(&provider, &sink, 60);

    svc.start().await;
    assert_eq!(provider.calls(), 1);

    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(provider.calls(), 2);
    assert_eq!(svc.armed_interval(), Some(Duration::from_secs(60)));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(provider.calls(), 3);

    svc.stop();
}

#[tokio::test(start_paused = true)]
async fn runtime_interval_is_floored_at_thirty_seconds() {
    let provider = FakeProvider::new(true);
    let sink = Arc::new(RecordingSink::default());
    let svc = service(&provider, &sink, 10);

    svc.start().await;
    assert_eq!(svc.armed_interval(), Some(Duration::from_secs(30)));

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(provider.calls(), 1);

    svc.stop();
}

#[tokio::test(start_paused = true)]
async fn configured_interval_applies_after_restart() {
    let sm = SettingsManager::new(Database::open_in_memory().unwrap());
    let err = sm.set_polling_interval(10).unwrap_err();
    assert!(matches!(err, ConfigError::Validation { .. }));
    assert_eq!(AppConfig::load(&sm).unwrap().poll_interval, 60);

    sm.set_polling_interval(45).unwrap();
    let config = AppConfig::load(&sm).unwrap();

    let provider = FakeProvider::new(true);
    let sink = Arc::new(RecordingSink::default());
    let svc = service(&provider, &sink, 60);
    svc.start().await;
    assert_eq!(svc.armed_interval(), Some(Duration::from_secs(60)));

    svc.set_interval_secs(config.poll_interval);
    svc.restart().await;
    assert_eq!(svc.armed_interval(), Some(Duration::from_secs(45)));

    svc.stop();
}

#[tokio::test(start_paused = true)]
async fn restarts_leave_a_single_timer() {
    let provider = FakeProvider::new(true);
    let sink = Arc::new(RecordingSink::default());
    let svc = service(&provider, &sink, 60);

    svc.start().await;
    svc.restart().await;
    svc.restart().await;
    assert_eq!(provider.calls(), 3);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(provider.calls(), 4);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(provider.calls(), 5);

    svc.stop();
}

#[tokio::test(start_paused = true)]
async fn start_is_idempotent() {
    let provider = FakeProvider::new(true);
    let sink = Arc::new(RecordingSink::default());
    let svc = service(&provider, &sink, 60);

    svc.start().await;
    assert!(svc.start().await);
    assert_eq!(provider.calls(), 1);

    svc.stop();
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent() {
    let provider = FakeProvider::new(true);
    let sink = Arc::new(RecordingSink::default());
    let svc = service(&provider, &sink, 60);

    svc.stop();
    svc.start().await;
    svc.stop();
    svc.stop();
    assert!(!svc.is_polling());
    assert_eq!(svc.armed_interval(), None);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn batch_fetched_after_stop_is_discarded() {
    let provider = FakeProvider::new(true);
    let sink = Arc::new(RecordingSink::default());
    let svc = service(&provider, &sink, 60);
    svc.start().await;

    *provider.delay.lock().unwrap() = Some(Duration::from_secs(5));
    provider.push(Ok(vec![rec("late", 1)]));

    let in_flight = {
        let svc = svc.clone();
        tokio::spawn(async move { svc.poll().await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;

    // A second trigger while the fetch is pending is skipped.
    assert_eq!(svc.poll().await, PollOutcome::Skipped);

    svc.stop();
    assert_eq!(in_flight.await.unwrap(), PollOutcome::Skipped);
    assert!(sink.shown.lock().unwrap().is_empty());
    assert_eq!(svc.seen_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn seen_set_stays_bounded_across_polls() {
    let provider = FakeProvider::new(true);
    let sink = Arc::new(RecordingSink::default());
    let svc = service(&provider, &sink, 60);
    svc.start().await;

    for round in 0..3 {
        let batch = (0..400)
            .map(|i| rec(&format!("r{round}-{i}"), round * 1000 + i))
            .collect();
        provider.push(Ok(batch));
        svc.poll().await;
        assert!(svc.seen_count() <= seen::SEEN_HARD_CEILING);
    }
    // 1200 added; the prune after round 3 keeps the newest 500.
    assert_eq!(svc.seen_count(), seen::SEEN_RETAIN);

    svc.stop();
}

#[tokio::test(start_paused = true)]
async fn status_reflects_state() {
    let provider = FakeProvider::new(true);
    let sink = Arc::new(RecordingSink::default());
    let svc = service(&provider, &sink, 120);

    let status = svc.status();
    assert!(!status.is_polling);
    assert!(!status.timer_armed);

    svc.start().await;
    let status = svc.status();
    assert!(status.is_polling);
    assert!(status.timer_armed);
    assert_eq!(status.interval_secs, 120);

    svc.stop();
}
