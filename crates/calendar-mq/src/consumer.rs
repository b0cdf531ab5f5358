use async_trait::async_trait;
use calendar_core::Notification;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::connector::Connector;
use crate::error::MqError;

/// Subscribes to the broker and hands decoded notifications to the caller.
#[async_trait]
pub trait Consumer: Connector {
    /// Start the delivery loop and return its [`Subscription`].
    ///
    /// The loop runs as its own task, checks `cancel` while waiting on the
    /// broker, and drops (after logging) any payload that does not decode.
    /// The subscription ends when the loop exits.
    async fn consume(&mut self, cancel: CancellationToken) -> Result<Subscription, MqError>;

    /// Release the connection. Idempotent; a no-op if never connected.
    ///
    /// Call only after the owning loop has observed cancellation and exited.
    async fn close(&mut self) -> Result<(), MqError>;
}

/// Receiving end of the in-process handoff between a consumer's delivery loop
/// and whoever drains it.
///
/// Unbounded: if the drain side is slower than delivery, items queue here.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl Subscription {
    /// Create a connected sender / subscription pair.
    pub fn channel() -> (mpsc::UnboundedSender<Notification>, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Subscription { rx })
    }

    /// Next notification in delivery order, or `None` once the delivery loop
    /// has exited and the queue is drained.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }
}
