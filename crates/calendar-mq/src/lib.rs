//! `calendar-mq`: broker clients carrying notifications from the scheduler
//! to the storer.
//!
//! # Lifecycle
//!
//! Every client is a [`Connector`]: `connect` makes one handshake attempt and
//! `wait_for_connect` retries it with linearly growing backoff
//! (`backoff * attempt`) until it succeeds, the attempts run out
//! (`ConnectFailed`) or the cancellation token fires (`Cancelled`).
//!
//! # Backends
//!
//! | Backend  | Producer          | Consumer          |
//! |----------|-------------------|-------------------|
//! | Redis    | [`RedisProducer`] | [`RedisConsumer`] |
//! | Memory   | [`MemoryProducer`]| [`MemoryConsumer`]|

pub mod codec;
pub mod connector;
pub mod consumer;
pub mod error;
pub mod memory;
pub mod producer;
pub mod redis;

pub use connector::Connector;
pub use consumer::{Consumer, Subscription};
pub use error::MqError;
pub use memory::{MemoryBroker, MemoryConsumer, MemoryProducer};
pub use producer::Producer;
pub use self::redis::{RedisConsumer, RedisProducer};
