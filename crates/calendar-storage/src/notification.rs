use async_trait::async_trait;
use calendar_core::Notification;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Durable record of delivered notifications.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a delivered notification.
    ///
    /// Idempotent on `notification.id`: a redelivered duplicate is accepted
    /// and leaves the existing record untouched.
    async fn save_notification(&self, notification: &Notification) -> Result<()>;

    /// Notifications for `user_id` with `notify_at` in `[from, to]`, oldest first.
    async fn list_notifications(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Notification>>;
}
