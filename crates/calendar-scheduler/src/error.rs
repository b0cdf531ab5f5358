use calendar_mq::MqError;
use calendar_storage::StorageError;
use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The event store could not serve a pass's window query.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The producer failed to connect or to release its connection.
    #[error("Broker error: {0}")]
    Broker(#[from] MqError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
