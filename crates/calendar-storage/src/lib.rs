//! `calendar-storage`: event and notification persistence.
//!
//! Two ports, [`EventStore`] and [`NotificationStore`], each with an in-memory
//! and a SQLite backend. The scheduler and gateway only see the traits; the
//! binaries pick a backend from [`StorageConfig`] via [`open_event_store`].

use std::sync::Arc;

use calendar_core::config::{StorageConfig, StorageKind};
use tracing::info;

pub mod db;
pub mod error;
pub mod event;
pub mod memory;
pub mod notification;
pub mod sqlite;

pub use error::{Result, StorageError};
pub use event::EventStore;
pub use memory::{MemoryEventStore, MemoryNotificationStore};
pub use notification::NotificationStore;
pub use sqlite::{SqliteEventStore, SqliteNotificationStore};

/// Open the event store backend selected by `config.kind`.
pub fn open_event_store(config: &StorageConfig) -> Result<Arc<dyn EventStore>> {
    match config.kind {
        StorageKind::Memory => {
            info!("using in-memory event store");
            Ok(Arc::new(MemoryEventStore::new()))
        }
        StorageKind::Sqlite => {
            info!(path = %config.path, "using SQLite event store");
            let conn = db::open_connection(&config.path)?;
            Ok(Arc::new(SqliteEventStore::new(conn)?))
        }
    }
}
