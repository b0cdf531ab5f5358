use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use calendar_core::{Event, Notification};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::event::EventStore;
use crate::notification::NotificationStore;

/// In-process event store: a map behind one read/write lock.
#[derive(Default)]
pub struct MemoryEventStore {
    events: RwLock<HashMap<String, Event>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn create_event(&self, event: Event) -> Result<Event> {
        let mut event = event.at_storage_precision();
        event.validate().map_err(StorageError::InvalidEvent)?;

        let mut events = self.events.write().await;
        // Full scan under the write lock: every committed event is observed.
        if events.values().any(|e| e.collides_with(&event)) {
            return Err(StorageError::DateBusy);
        }

        event.id = Uuid::new_v4().to_string();
        events.insert(event.id.clone(), event.clone());
        debug!(event_id = %event.id, user_id = %event.user_id, "event created");
        Ok(event)
    }

    async fn update_event(&self, event: Event) -> Result<()> {
        let event = event.at_storage_precision();
        event.validate().map_err(StorageError::InvalidEvent)?;

        let mut events = self.events.write().await;
        if !events.contains_key(&event.id) {
            return Err(StorageError::not_found(&event.id));
        }
        if events
            .values()
            .any(|e| e.id != event.id && e.collides_with(&event))
        {
            return Err(StorageError::DateBusy);
        }

        debug!(event_id = %event.id, "event updated");
        events.insert(event.id.clone(), event);
        Ok(())
    }

    async fn delete_event(&self, id: &str) -> Result<()> {
        let mut events = self.events.write().await;
        match events.remove(id) {
            Some(_) => {
                debug!(event_id = %id, "event deleted");
                Ok(())
            }
            None => Err(StorageError::not_found(id)),
        }
    }

    async fn get_event(&self, id: &str) -> Result<Event> {
        let events = self.events.read().await;
        events
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(id))
    }

    async fn list_events(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Event>> {
        let events = self.events.read().await;
        Ok(events
            .values()
            .filter(|e| e.start_time >= from && e.start_time <= to)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct NotificationLog {
    /// Arrival order.
    entries: Vec<Notification>,
    ids: HashSet<String>,
}

/// In-process notification log, kept in arrival order.
#[derive(Default)]
pub struct MemoryNotificationStore {
    log: RwLock<NotificationLog>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything saved so far, in arrival order.
    pub async fn all(&self) -> Vec<Notification> {
        self.log.read().await.entries.clone()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn save_notification(&self, notification: &Notification) -> Result<()> {
        let mut log = self.log.write().await;
        if !log.ids.insert(notification.id.clone()) {
            debug!(notification_id = %notification.id, "duplicate notification ignored");
            return Ok(());
        }
        log.entries.push(notification.clone());
        Ok(())
    }

    async fn list_notifications(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let log = self.log.read().await;
        let mut matching: Vec<Notification> = log
            .entries
            .iter()
            .filter(|n| n.user_id == user_id && n.notify_at >= from && n.notify_at <= to)
            .cloned()
            .collect();
        matching.sort_by_key(|n| n.notify_at);
        Ok(matching)
    }
}
