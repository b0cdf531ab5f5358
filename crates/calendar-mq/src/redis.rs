//! Redis Streams backend.
//!
//! - [`RedisProducer`] appends entries with [`XADD`](https://redis.io/commands/xadd),
//!   capping the stream length approximately.
//! - [`RedisConsumer`] reads through a consumer group with
//!   [`XREADGROUP`](https://redis.io/commands/xreadgroup) and acknowledges each
//!   entry once it has been handed off (malformed ones included, since they
//!   would never decode on redelivery either).
//!
//! A new group starts at the head of the stream, so entries published before
//! the first consumer connected are still delivered. Each delivery loop first
//! replays this consumer's pending (delivered but unacknowledged) entries,
//! then switches to entries never delivered to the group.
//!
//! A single stream is totally ordered, which subsumes per-user ordering. The
//! partition key is still written to every entry under [`KEY_FIELD`].

use std::time::Duration;

use async_trait::async_trait;
use calendar_core::config::BrokerConfig;
use calendar_core::Notification;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisResult};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec;
use crate::connector::Connector;
use crate::consumer::{Consumer, Subscription};
use crate::error::MqError;
use crate::producer::Producer;

/// Stream entry field holding the partition key (user ID).
pub const KEY_FIELD: &str = "key";
/// Stream entry field holding the JSON-encoded notification.
pub const PAYLOAD_FIELD: &str = "payload";
/// Start consumer groups at the head of the stream.
const GROUP_START_ID: &str = "0";
/// Read this consumer's pending entries from the beginning.
const STREAM_ID_PENDING: &str = "0";
/// Read entries never delivered to any consumer in the group.
const STREAM_ID_NEW_ENTRIES: &str = ">";
/// Entries fetched per XREADGROUP round trip.
const READ_BATCH: usize = 16;
/// Pause after a failed read before trying again.
const READ_ERROR_PAUSE: Duration = Duration::from_secs(1);

async fn open(url: &str) -> Result<MultiplexedConnection, MqError> {
    let client = redis::Client::open(url)?;
    let mut conn = client.get_multiplexed_async_connection().await?;
    let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
    Ok(conn)
}

/// Publishes notifications to a Redis stream.
pub struct RedisProducer {
    config: BrokerConfig,
    conn: Option<MultiplexedConnection>,
}

impl RedisProducer {
    pub fn new(config: BrokerConfig) -> Self {
        Self { config, conn: None }
    }
}

#[async_trait]
impl Connector for RedisProducer {
    fn name(&self) -> &str {
        "redis-producer"
    }

    async fn connect(&mut self) -> Result<(), MqError> {
        let conn = open(&self.config.url)
            .await
            .map_err(|e| MqError::Unavailable(e.to_string()))?;
        self.conn = Some(conn);
        Ok(())
    }
}

#[async_trait]
impl Producer for RedisProducer {
    async fn send(&self, notification: &Notification) -> Result<(), MqError> {
        let mut conn = self.conn.clone().ok_or(MqError::NotConnected)?;
        let payload = codec::encode(notification)?;

        let entry_id: String = conn
            .xadd_maxlen(
                &self.config.stream,
                StreamMaxlen::Approx(self.config.max_len),
                "*",
                &[
                    (KEY_FIELD, notification.user_id.as_bytes()),
                    (PAYLOAD_FIELD, payload.as_slice()),
                ],
            )
            .await
            .map_err(|e| MqError::Send(e.to_string()))?;

        debug!(
            stream = %self.config.stream,
            entry_id = %entry_id,
            notification_id = %notification.id,
            "notification published"
        );
        Ok(())
    }

    async fn close(&mut self) -> Result<(), MqError> {
        if self.conn.take().is_some() {
            info!(stream = %self.config.stream, "producer connection released");
        }
        Ok(())
    }
}

/// Reads notifications from a Redis stream through a consumer group.
pub struct RedisConsumer {
    config: BrokerConfig,
    conn: Option<MultiplexedConnection>,
    delivery: Option<JoinHandle<()>>,
}

impl RedisConsumer {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            conn: None,
            delivery: None,
        }
    }
}

#[async_trait]
impl Connector for RedisConsumer {
    fn name(&self) -> &str {
        "redis-consumer"
    }

    async fn connect(&mut self) -> Result<(), MqError> {
        let mut conn = open(&self.config.url)
            .await
            .map_err(|e| MqError::Unavailable(e.to_string()))?;

        // An existing group is fine; anything else means the broker is unusable.
        let created: RedisResult<()> = conn
            .xgroup_create_mkstream(&self.config.stream, &self.config.group, GROUP_START_ID)
            .await;
        match created {
            Ok(()) => info!(
                stream = %self.config.stream,
                group = %self.config.group,
                "consumer group created"
            ),
            Err(e) if e.code() == Some("BUSYGROUP") => {}
            Err(e) => return Err(MqError::Unavailable(e.to_string())),
        }

        self.conn = Some(conn);
        Ok(())
    }
}

#[async_trait]
impl Consumer for RedisConsumer {
    async fn consume(&mut self, cancel: CancellationToken) -> Result<Subscription, MqError> {
        let conn = self.conn.clone().ok_or(MqError::NotConnected)?;
        let (tx, subscription) = Subscription::channel();
        self.delivery = Some(tokio::spawn(deliver(
            conn,
            self.config.clone(),
            tx,
            cancel,
        )));
        Ok(subscription)
    }

    async fn close(&mut self) -> Result<(), MqError> {
        if let Some(delivery) = self.delivery.take() {
            delivery.abort();
        }
        if self.conn.take().is_some() {
            info!(stream = %self.config.stream, "consumer connection released");
        }
        Ok(())
    }
}

/// Delivery loop: XREADGROUP → decode → handoff → XACK.
async fn deliver(
    mut conn: MultiplexedConnection,
    config: BrokerConfig,
    tx: mpsc::UnboundedSender<Notification>,
    cancel: CancellationToken,
) {
    let options = StreamReadOptions::default()
        .group(&config.group, &config.consumer)
        .count(READ_BATCH)
        .block(config.block_ms as usize);
    let keys = [config.stream.as_str()];
    let mut cursor = STREAM_ID_PENDING.to_string();

    info!(stream = %config.stream, group = %config.group, consumer = %config.consumer, "delivery loop started");

    loop {
        let ids = [cursor.as_str()];
        let read: RedisResult<Option<StreamReadReply>> = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            read = conn.xread_options(&keys, &ids, &options) => read,
        };

        let entries: Vec<StreamId> = match read {
            Ok(Some(reply)) => reply.keys.into_iter().flat_map(|key| key.ids).collect(),
            // Block timeout with nothing new.
            Ok(None) => Vec::new(),
            Err(e) => {
                error!(error = %e, stream = %config.stream, "stream read failed");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(READ_ERROR_PAUSE) => continue,
                }
            }
        };

        let next = next_cursor(&cursor, entries.last().map(|entry| entry.id.as_str()));
        if next != cursor && next == STREAM_ID_NEW_ENTRIES {
            debug!(stream = %config.stream, "pending entries replayed, reading new entries");
        }
        cursor = next;

        for entry in entries {
            match entry.get::<Vec<u8>>(PAYLOAD_FIELD) {
                Some(payload) => {
                    if let Some(notification) = codec::decode(&payload) {
                        if tx.send(notification).is_err() {
                            debug!("subscription dropped; stopping delivery");
                            return;
                        }
                    }
                }
                None => warn!(entry_id = %entry.id, "stream entry without payload dropped"),
            }

            let acked: RedisResult<()> = conn
                .xack(&config.stream, &config.group, &[&entry.id])
                .await;
            if let Err(e) = acked {
                warn!(entry_id = %entry.id, error = %e, "failed to acknowledge stream entry");
            }
        }
    }

    debug!(stream = %config.stream, "redis delivery loop cancelled");
}

/// Read position after a batch whose last entry is `last_delivered`.
///
/// While replaying pending entries the cursor advances past each batch; an
/// empty batch means the backlog is drained and reading moves on to new
/// entries, where it stays.
fn next_cursor(current: &str, last_delivered: Option<&str>) -> String {
    if current == STREAM_ID_NEW_ENTRIES {
        return current.to_string();
    }
    match last_delivered {
        Some(id) => id.to_string(),
        None => STREAM_ID_NEW_ENTRIES.to_string(),
    }
}
