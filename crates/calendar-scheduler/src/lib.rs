//! `calendar-scheduler`: periodic reminder scanner.
//!
//! # Overview
//!
//! The [`engine::SchedulerEngine`] wakes on a fixed interval (and once right
//! at start) and runs two passes against the [`EventStore`]:
//!
//! | Pass    | Window                         | Action per event                 |
//! |---------|--------------------------------|----------------------------------|
//! | Notify  | `[now, now + interval]`        | publish a reminder if it is due  |
//! | Cleanup | `[MIN_UTC, now - retention]`   | delete the event                 |
//!
//! Nothing is carried between ticks; every tick recomputes from the store.
//!
//! [`EventStore`]: calendar_storage::EventStore

pub mod engine;
pub mod error;

pub use engine::{SchedulerEngine, TickReport};
pub use error::{Result, SchedulerError};
