use async_trait::async_trait;
use calendar_core::Notification;

use crate::connector::Connector;
use crate::error::MqError;

/// Publishes notifications to the broker, keyed by `user_id`.
///
/// The broker preserves order only within one key's stream.
#[async_trait]
pub trait Producer: Connector {
    /// Serialize and publish one notification. Transport failures surface as
    /// [`MqError::Send`]; callers decide whether that is fatal.
    async fn send(&self, notification: &Notification) -> Result<(), MqError>;

    /// Release the connection. Idempotent; a no-op if never connected.
    async fn close(&mut self) -> Result<(), MqError>;
}
