use thiserror::Error;

/// Errors that can occur within any broker client.
#[derive(Debug, Error)]
pub enum MqError {
    /// A single connect attempt failed; `wait_for_connect` may retry it.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// Every configured connect attempt failed. Fatal to process startup.
    #[error("Failed to connect after {attempts} attempts: {reason}")]
    ConnectFailed { attempts: u32, reason: String },

    /// The cancellation token fired while waiting to retry a connect.
    #[error("Operation cancelled")]
    Cancelled,

    /// The client was used before a successful `connect`.
    #[error("Not connected")]
    NotConnected,

    /// A notification could not be published.
    #[error("Send failed: {0}")]
    Send(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}
