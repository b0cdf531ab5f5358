use std::sync::Arc;
use std::time::Duration;

use calendar_core::config::SchedulerConfig;
use calendar_core::{Event, Notification};
use calendar_mq::Producer;
use calendar_storage::EventStore;
use chrono::{DateTime, TimeDelta, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::Result;

/// `tokio::time::interval` rejects a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Counters from one tick, logged at `info` and handy in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Events returned by the notify window query.
    pub scanned: usize,
    /// Notifications the producer accepted.
    pub sent: usize,
    /// Events removed by the cleanup pass.
    pub deleted: usize,
}

/// Periodic driver: scans for due reminders and purges expired events.
///
/// Interval and retention are fixed for the engine's lifetime.
pub struct SchedulerEngine {
    store: Arc<dyn EventStore>,
    producer: Box<dyn Producer>,
    interval: Duration,
    retention: Duration,
}

impl SchedulerEngine {
    /// Build an engine around a store and an already connected producer.
    pub fn new(
        store: Arc<dyn EventStore>,
        producer: Box<dyn Producer>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            store,
            producer,
            interval: config.interval().max(MIN_INTERVAL),
            retention: config.retention(),
        }
    }

    /// Main loop. Ticks once immediately, then every `interval`, until
    /// `cancel` fires.
    ///
    /// A tick always runs both passes to completion; cancellation is only
    /// observed before the next one starts. Overrunning ticks are neither
    /// skipped nor coalesced.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            retention_secs = self.retention.as_secs(),
            "scheduler engine started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        loop {
            if cancel.is_cancelled() {
                break;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.tick(Utc::now()).await;
        }

        info!("scheduler engine shutting down");
    }

    /// Run the notify pass and then the cleanup pass as of `now`.
    ///
    /// A failed window query aborts only its own pass.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        match self.notify_pass(now).await {
            Ok((scanned, sent)) => {
                report.scanned = scanned;
                report.sent = sent;
            }
            Err(e) => error!(error = %e, "notify pass failed"),
        }

        match self.cleanup_pass(now).await {
            Ok(deleted) => report.deleted = deleted,
            Err(e) => error!(error = %e, "cleanup pass failed"),
        }

        info!(
            scanned = report.scanned,
            sent = report.sent,
            deleted = report.deleted,
            "scheduler tick complete"
        );
        report
    }

    /// Release the producer. Call after [`run`](Self::run) has returned.
    pub async fn close(mut self) -> Result<()> {
        self.producer.close().await?;
        Ok(())
    }

    async fn notify_pass(&self, now: DateTime<Utc>) -> Result<(usize, usize)> {
        let window_end = now
            .checked_add_signed(span(self.interval))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let events = self.store.list_events(now, window_end).await?;

        let mut sent = 0;
        for event in &events {
            let Some(reminder_at) = event.reminder_at else {
                continue;
            };
            // Strict on both ends: future reminders inside this tick's window.
            if !(now < reminder_at && reminder_at < window_end) {
                continue;
            }

            let notification = reminder_for(event, now);
            match self.producer.send(&notification).await {
                Ok(()) => {
                    sent += 1;
                    debug!(
                        event_id = %event.id,
                        user_id = %event.user_id,
                        notification_id = %notification.id,
                        "reminder sent"
                    );
                }
                Err(e) => warn!(event_id = %event.id, error = %e, "failed to send reminder"),
            }
        }

        Ok((events.len(), sent))
    }

    async fn cleanup_pass(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now
            .checked_sub_signed(span(self.retention))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let expired = self
            .store
            .list_events(DateTime::<Utc>::MIN_UTC, cutoff)
            .await?;

        let mut deleted = 0;
        for event in &expired {
            match self.store.delete_event(&event.id).await {
                Ok(()) => {
                    deleted += 1;
                    debug!(event_id = %event.id, "expired event deleted");
                }
                Err(e) => warn!(event_id = %event.id, error = %e, "failed to delete expired event"),
            }
        }

        Ok(deleted)
    }
}

fn span(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}

fn reminder_for(event: &Event, now: DateTime<Utc>) -> Notification {
    Notification {
        id: Uuid::new_v4().to_string(),
        event_id: event.id.clone(),
        event_title: event.title.clone(),
        user_id: event.user_id.clone(),
        message: format!(
            "Reminder: {} starts at {}",
            event.title,
            event.start_time.format("%H:%M")
        ),
        notify_at: now,
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use calendar_mq::{Connector, MqError};
    use calendar_storage::{MemoryEventStore, StorageError};
    use chrono::TimeZone;
    use std::sync::Mutex;

    /// Records every sent notification; refuses events titled "flaky".
    #[derive(Clone, Default)]
    struct Recorder {
        sent: Arc<Mutex<Vec<Notification>>>,
    }

    impl Recorder {
        fn sent(&self) -> Vec<Notification> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Connector for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn connect(&mut self) -> std::result::Result<(), MqError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Producer for Recorder {
        async fn send(&self, notification: &Notification) -> std::result::Result<(), MqError> {
            if notification.event_title == "flaky" {
                return Err(MqError::Send("broker hiccup".to_string()));
            }
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }

        async fn close(&mut self) -> std::result::Result<(), MqError> {
            Ok(())
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap()
    }

    fn config(interval: Duration, retention: Duration) -> SchedulerConfig {
        SchedulerConfig {
            interval_secs: interval.as_secs(),
            retention_secs: retention.as_secs(),
        }
    }

    fn engine(store: Arc<MemoryEventStore>, recorder: &Recorder, interval_mins: u64) -> SchedulerEngine {
        SchedulerEngine::new(
            store,
            Box::new(recorder.clone()),
            &config(
                Duration::from_secs(interval_mins * 60),
                Duration::from_secs(24 * 60 * 60),
            ),
        )
    }

    fn event(title: &str, start: DateTime<Utc>, reminder_at: Option<DateTime<Utc>>) -> Event {
        Event {
            id: String::new(),
            title: title.to_string(),
            description: String::new(),
            start_time: start,
            end_time: start + TimeDelta::minutes(30),
            user_id: format!("user-{title}"),
            reminder_at,
        }
    }

    #[tokio::test]
    async fn reminder_inside_window_fires_once() {
        let store = Arc::new(MemoryEventStore::new());
        let recorder = Recorder::default();
        let engine = engine(store.clone(), &recorder, 10);
        let now = base();

        let due = store
            .create_event(event(
                "standup",
                now + TimeDelta::minutes(8),
                Some(now + TimeDelta::minutes(5)),
            ))
            .await
            .unwrap();
        store
            .create_event(event("silent", now + TimeDelta::minutes(6), None))
            .await
            .unwrap();
        store
            .create_event(event("past", now + TimeDelta::minutes(2), Some(now)))
            .await
            .unwrap();

        let report = engine.tick(now).await;

        assert_eq!(report.scanned, 3);
        assert_eq!(report.sent, 1);
        let sent = recorder.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event_id, due.id);
        assert_eq!(sent[0].user_id, "user-standup");
        assert_eq!(sent[0].notify_at, now);
        assert_eq!(sent[0].message, "Reminder: standup starts at 12:08");
    }

    #[tokio::test]
    async fn cleanup_removes_only_events_past_retention() {
        let store = Arc::new(MemoryEventStore::new());
        let recorder = Recorder::default();
        let engine = engine(store.clone(), &recorder, 10);
        let now = base();
        let cutoff = now - TimeDelta::days(1);

        let old = store
            .create_event(event("old", cutoff - TimeDelta::hours(1), None))
            .await
            .unwrap();
        let recent = store
            .create_event(event("recent", cutoff + TimeDelta::hours(1), None))
            .await
            .unwrap();

        let report = engine.tick(now).await;

        assert_eq!(report.deleted, 1);
        assert!(matches!(
            store.get_event(&old.id).await,
            Err(StorageError::EventNotFound { .. })
        ));
        assert!(store.get_event(&recent.id).await.is_ok());
    }

    #[tokio::test]
    async fn reminder_fires_on_exactly_one_tick() {
        let store = Arc::new(MemoryEventStore::new());
        let recorder = Recorder::default();
        let engine = engine(store.clone(), &recorder, 10);
        let t0 = base();

        store
            .create_event(event(
                "review",
                t0 + TimeDelta::minutes(30),
                Some(t0 + TimeDelta::minutes(25)),
            ))
            .await
            .unwrap();

        // Windows: (10, 20) misses, (20, 30) hits, (30, 40) and later miss.
        for minutes in [10, 20, 30, 40] {
            engine.tick(t0 + TimeDelta::minutes(minutes)).await;
        }

        assert_eq!(recorder.sent().len(), 1);
    }

    #[tokio::test]
    async fn send_failure_does_not_stop_the_pass() {
        let store = Arc::new(MemoryEventStore::new());
        let recorder = Recorder::default();
        let engine = engine(store.clone(), &recorder, 10);
        let now = base();

        for (title, offset) in [("flaky", 3), ("lunch", 4), ("call", 5)] {
            store
                .create_event(event(
                    title,
                    now + TimeDelta::minutes(offset + 1),
                    Some(now + TimeDelta::minutes(offset)),
                ))
                .await
                .unwrap();
        }

        let report = engine.tick(now).await;

        assert_eq!(report.sent, 2);
        let mut titles: Vec<_> = recorder
            .sent()
            .into_iter()
            .map(|n| n.event_title)
            .collect();
        titles.sort();
        assert_eq!(titles, vec!["call", "lunch"]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_immediately_and_stops_on_cancel() {
        let store = Arc::new(MemoryEventStore::new());
        let recorder = Recorder::default();
        let engine = Arc::new(engine(store.clone(), &recorder, 1));
        let now = Utc::now();

        store
            .create_event(event(
                "soon",
                now + TimeDelta::seconds(50),
                Some(now + TimeDelta::seconds(30)),
            ))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let handle = {
            let engine = engine.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { engine.run(cancel).await })
        };

        while recorder.sent().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(recorder.sent().len(), 1);
    }

    #[tokio::test]
    async fn run_returns_without_ticking_when_already_cancelled() {
        let store = Arc::new(MemoryEventStore::new());
        let recorder = Recorder::default();
        let engine = engine(store.clone(), &recorder, 1);
        let now = Utc::now();
        store
            .create_event(event(
                "soon",
                now + TimeDelta::seconds(50),
                Some(now + TimeDelta::seconds(30)),
            ))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        engine.run(cancel).await;

        assert!(recorder.sent().is_empty());
    }
}
