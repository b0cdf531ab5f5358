//! In-process broker: one queue, one subscriber.
//!
//! Used by tests and single-process deployments. A [`MemoryBroker`] hands out
//! producers and consumers sharing the same queue; [`MemoryBroker::publish_raw`]
//! can inject arbitrary payloads and [`MemoryBroker::shutdown`] ends the
//! subscriber's stream once the queue is drained.

use std::sync::Arc;

use async_trait::async_trait;
use calendar_core::Notification;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::codec;
use crate::connector::Connector;
use crate::consumer::{Consumer, Subscription};
use crate::error::MqError;
use crate::producer::Producer;

/// One entry on the in-process queue.
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    /// Partition key (the notification's user ID).
    pub key: String,
    pub payload: Vec<u8>,
}

struct BrokerState {
    /// `None` once the broker is shut down.
    tx: Option<mpsc::UnboundedSender<BrokerMessage>>,
    /// `None` once a consumer has claimed the subscriber slot.
    rx: Option<mpsc::UnboundedReceiver<BrokerMessage>>,
}

/// Shared handle to an in-process queue. Cheap to clone.
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                tx: Some(tx),
                rx: Some(rx),
            })),
        }
    }

    pub fn producer(&self) -> MemoryProducer {
        MemoryProducer {
            broker: self.clone(),
            connected: false,
        }
    }

    pub fn consumer(&self) -> MemoryConsumer {
        MemoryConsumer {
            broker: self.clone(),
            rx: None,
            delivery: None,
        }
    }

    /// Enqueue a raw payload, bypassing serialization.
    pub async fn publish_raw(&self, key: &str, payload: Vec<u8>) -> Result<(), MqError> {
        let state = self.state.lock().await;
        let tx = state
            .tx
            .as_ref()
            .ok_or_else(|| MqError::Send("broker is shut down".to_string()))?;
        tx.send(BrokerMessage {
            key: key.to_string(),
            payload,
        })
        .map_err(|_| MqError::Send("no subscriber queue".to_string()))
    }

    /// Stop accepting messages. The subscriber drains what is queued, then
    /// its subscription ends.
    pub async fn shutdown(&self) {
        self.state.lock().await.tx = None;
    }

    async fn is_open(&self) -> bool {
        self.state.lock().await.tx.is_some()
    }

    async fn claim_subscriber(&self) -> Option<mpsc::UnboundedReceiver<BrokerMessage>> {
        self.state.lock().await.rx.take()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer half of a [`MemoryBroker`].
pub struct MemoryProducer {
    broker: MemoryBroker,
    connected: bool,
}

#[async_trait]
impl Connector for MemoryProducer {
    fn name(&self) -> &str {
        "memory-producer"
    }

    async fn connect(&mut self) -> Result<(), MqError> {
        if !self.broker.is_open().await {
            return Err(MqError::Unavailable("broker is shut down".to_string()));
        }
        self.connected = true;
        Ok(())
    }
}

#[async_trait]
impl Producer for MemoryProducer {
    async fn send(&self, notification: &Notification) -> Result<(), MqError> {
        if !self.connected {
            return Err(MqError::NotConnected);
        }
        let payload = codec::encode(notification)?;
        self.broker
            .publish_raw(&notification.user_id, payload)
            .await
    }

    async fn close(&mut self) -> Result<(), MqError> {
        self.connected = false;
        Ok(())
    }
}

/// Consumer half of a [`MemoryBroker`]. Only one consumer can hold the
/// subscriber slot for the lifetime of the broker.
pub struct MemoryConsumer {
    broker: MemoryBroker,
    rx: Option<mpsc::UnboundedReceiver<BrokerMessage>>,
    delivery: Option<JoinHandle<()>>,
}

#[async_trait]
impl Connector for MemoryConsumer {
    fn name(&self) -> &str {
        "memory-consumer"
    }

    async fn connect(&mut self) -> Result<(), MqError> {
        if self.rx.is_some() {
            return Ok(());
        }
        match self.broker.claim_subscriber().await {
            Some(rx) => {
                self.rx = Some(rx);
                Ok(())
            }
            None => Err(MqError::Unavailable(
                "subscriber slot already claimed".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Consumer for MemoryConsumer {
    async fn consume(&mut self, cancel: CancellationToken) -> Result<Subscription, MqError> {
        let rx = self.rx.take().ok_or(MqError::NotConnected)?;
        let (tx, subscription) = Subscription::channel();
        self.delivery = Some(tokio::spawn(deliver(rx, tx, cancel)));
        Ok(subscription)
    }

    async fn close(&mut self) -> Result<(), MqError> {
        self.rx = None;
        if let Some(delivery) = self.delivery.take() {
            delivery.abort();
        }
        Ok(())
    }
}

/// Delivery loop: queue → decode → handoff.
async fn deliver(
    mut rx: mpsc::UnboundedReceiver<BrokerMessage>,
    tx: mpsc::UnboundedSender<Notification>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("memory delivery loop cancelled");
                break;
            }
            message = rx.recv() => match message {
                Some(message) => message,
                None => {
                    info!("memory broker closed");
                    break;
                }
            },
        };

        let Some(notification) = codec::decode(&message.payload) else {
            continue;
        };
        if tx.send(notification).is_err() {
            debug!("subscription dropped; stopping delivery");
            break;
        }
    }
}
