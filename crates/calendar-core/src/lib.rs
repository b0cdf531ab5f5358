//! `calendar-core`: shared models, configuration and error types for the
//! calendar services (gateway, scheduler, storer).

pub mod config;
pub mod error;
pub mod models;
pub mod telemetry;

pub use config::CalendarConfig;
pub use error::{CalendarError, Result};
pub use models::{Event, Notification};
