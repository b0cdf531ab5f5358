use async_trait::async_trait;
use calendar_core::{Event, Notification};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, StorageError};
use crate::event::EventStore;
use crate::notification::NotificationStore;

const EVENT_COLUMNS: &str =
    "id, title, description, start_time, end_time, user_id, reminder_at";

const NOTIFICATION_COLUMNS: &str =
    "id, event_id, event_title, user_id, message, notify_at, created_at";

/// SQLite-backed event store.
///
/// Wraps a single connection in an async `Mutex`; the slot check and the
/// write that depends on it run under the same guard.
pub struct SqliteEventStore {
    db: Mutex<Connection>,
}

impl SqliteEventStore {
    /// Wrap `conn`, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    #[instrument(skip_all, fields(user_id = %event.user_id))]
    async fn create_event(&self, event: Event) -> Result<Event> {
        let mut event = event.at_storage_precision();
        event.validate().map_err(StorageError::InvalidEvent)?;

        let db = self.db.lock().await;
        let busy: bool = db.query_row(
            "SELECT EXISTS(SELECT 1 FROM events WHERE user_id = ?1 AND start_time = ?2)",
            params![event.user_id, micros(event.start_time)],
            |row| row.get(0),
        )?;
        if busy {
            return Err(StorageError::DateBusy);
        }

        event.id = Uuid::new_v4().to_string();
        db.execute(
            "INSERT INTO events
             (id, title, description, start_time, end_time, user_id, reminder_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.id,
                event.title,
                event.description,
                micros(event.start_time),
                micros(event.end_time),
                event.user_id,
                event.reminder_at.map(micros),
            ],
        )?;
        debug!(event_id = %event.id, "event created");
        Ok(event)
    }

    #[instrument(skip_all, fields(event_id = %event.id))]
    async fn update_event(&self, event: Event) -> Result<()> {
        let event = event.at_storage_precision();
        event.validate().map_err(StorageError::InvalidEvent)?;

        let db = self.db.lock().await;
        let exists: bool = db.query_row(
            "SELECT EXISTS(SELECT 1 FROM events WHERE id = ?1)",
            params![event.id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StorageError::not_found(&event.id));
        }

        let busy: bool = db.query_row(
            "SELECT EXISTS(SELECT 1 FROM events
                           WHERE user_id = ?1 AND start_time = ?2 AND id <> ?3)",
            params![event.user_id, micros(event.start_time), event.id],
            |row| row.get(0),
        )?;
        if busy {
            return Err(StorageError::DateBusy);
        }

        db.execute(
            "UPDATE events
             SET title = ?1, description = ?2, start_time = ?3, end_time = ?4,
                 user_id = ?5, reminder_at = ?6
             WHERE id = ?7",
            params![
                event.title,
                event.description,
                micros(event.start_time),
                micros(event.end_time),
                event.user_id,
                event.reminder_at.map(micros),
                event.id,
            ],
        )?;
        debug!("event updated");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_event(&self, id: &str) -> Result<()> {
        let db = self.db.lock().await;
        let rows_changed = db.execute("DELETE FROM events WHERE id = ?1", params![id])?;
        if rows_changed == 0 {
            return Err(StorageError::not_found(id));
        }
        debug!("event deleted");
        Ok(())
    }

    async fn get_event(&self, id: &str) -> Result<Event> {
        let db = self.db.lock().await;
        db.query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
            params![id],
            row_to_event,
        )
        .optional()?
        .ok_or_else(|| StorageError::not_found(id))
    }

    async fn list_events(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Event>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare_cached(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE start_time BETWEEN ?1 AND ?2"
        ))?;
        let events = stmt
            .query_map(params![micros(from), micros(to)], row_to_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }
}

/// SQLite-backed notification log.
pub struct SqliteNotificationStore {
    db: Mutex<Connection>,
}

impl SqliteNotificationStore {
    /// Wrap `conn`, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl NotificationStore for SqliteNotificationStore {
    #[instrument(skip_all, fields(notification_id = %notification.id))]
    async fn save_notification(&self, notification: &Notification) -> Result<()> {
        let db = self.db.lock().await;
        let inserted = db.execute(
            "INSERT OR IGNORE INTO notifications
             (id, event_id, event_title, user_id, message, notify_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                notification.id,
                notification.event_id,
                notification.event_title,
                notification.user_id,
                notification.message,
                micros(notification.notify_at),
                micros(notification.created_at),
            ],
        )?;
        if inserted == 0 {
            debug!("duplicate notification ignored");
        }
        Ok(())
    }

    async fn list_notifications(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare_cached(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = ?1 AND notify_at BETWEEN ?2 AND ?3
             ORDER BY notify_at"
        ))?;
        let notifications = stmt
            .query_map(params![user_id, micros(from), micros(to)], row_to_notification)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notifications)
    }
}

fn micros(t: DateTime<Utc>) -> i64 {
    t.timestamp_micros()
}

fn instant(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value: i64 = row.get(idx)?;
    DateTime::from_timestamp_micros(value)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

/// Map a SQLite row (in `EVENT_COLUMNS` order) to an `Event`.
fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let reminder_at = match row.get::<_, Option<i64>>(6)? {
        Some(value) => Some(
            DateTime::from_timestamp_micros(value)
                .ok_or(rusqlite::Error::IntegralValueOutOfRange(6, value))?,
        ),
        None => None,
    };
    Ok(Event {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        start_time: instant(row, 3)?,
        end_time: instant(row, 4)?,
        user_id: row.get(5)?,
        reminder_at,
    })
}

/// Map a SQLite row (in `NOTIFICATION_COLUMNS` order) to a `Notification`.
fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        event_id: row.get(1)?,
        event_title: row.get(2)?,
        user_id: row.get(3)?,
        message: row.get(4)?,
        notify_at: instant(row, 5)?,
        created_at: instant(row, 6)?,
    })
}
