use calendar_mq::MqError;
use thiserror::Error;

/// Errors that stop a storer outright. Per-notification save failures are
/// logged, not returned.
#[derive(Debug, Error)]
pub enum StorerError {
    /// The consumer could not start its subscription or release its connection.
    #[error("Broker error: {0}")]
    Broker(#[from] MqError),
}

pub type Result<T> = std::result::Result<T, StorerError>;
