use thiserror::Error;

/// Errors surfaced synchronously to event / notification store callers.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Another event of the same user already starts at the same instant.
    #[error("time slot is already busy")]
    DateBusy,

    /// The event failed field validation.
    #[error("invalid event data: {0}")]
    InvalidEvent(String),

    /// No event with the given ID exists in the store.
    #[error("event not found: {id}")]
    EventNotFound { id: String },

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The database file or its parent directory could not be prepared.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Short error code string, used by the HTTP layer in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::DateBusy => "DATE_BUSY",
            StorageError::InvalidEvent(_) => "INVALID_EVENT",
            StorageError::EventNotFound { .. } => "EVENT_NOT_FOUND",
            StorageError::Database(_) => "DATABASE_ERROR",
            StorageError::Io(_) => "IO_ERROR",
        }
    }

    pub(crate) fn not_found(id: &str) -> Self {
        StorageError::EventNotFound { id: id.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
