//! `calendar-storer`: drains the broker into the notification store.
//!
//! The [`Storer`] owns a connected [`Consumer`](calendar_mq::Consumer) and a
//! [`NotificationStore`](calendar_storage::NotificationStore). Each delivered
//! notification is saved once; a failed save is logged and the notification
//! is dropped.

pub mod error;
pub mod storer;

pub use error::{Result, StorerError};
pub use storer::{RunReport, Storer};
