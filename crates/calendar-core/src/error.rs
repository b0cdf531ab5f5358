use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalendarError {
    /// The config file or an environment override could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CalendarError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            CalendarError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, CalendarError>;
