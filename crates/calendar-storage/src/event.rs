use async_trait::async_trait;
use calendar_core::Event;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Authoritative set of calendar events.
///
/// Invariant: no two stored events share the same `(user_id, start_time)`.
/// Timestamps are stored at microsecond precision
/// ([`Event::at_storage_precision`]); finer digits are dropped on write.
/// Implementations let readers proceed concurrently while writers are
/// exclusive with every other reader and writer.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Assign a fresh ID and insert `event`, returning the stored copy.
    ///
    /// Fails with `InvalidEvent` on bad fields and `DateBusy` when any stored
    /// event already occupies the same user/start slot.
    async fn create_event(&self, event: Event) -> Result<Event>;

    /// Replace the event with ID `event.id` in place.
    ///
    /// Fails with `EventNotFound` if the ID is unknown and `DateBusy` if a
    /// *different* event occupies the new slot.
    async fn update_event(&self, event: Event) -> Result<()>;

    /// Remove an event. A second delete of the same ID reports `EventNotFound`.
    async fn delete_event(&self, id: &str) -> Result<()>;

    async fn get_event(&self, id: &str) -> Result<Event>;

    /// Every event whose `start_time` lies in `[from, to]`, both ends inclusive.
    /// Order is unspecified.
    async fn list_events(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Event>>;
}
