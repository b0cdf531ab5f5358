use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

/// Open (creating if needed) the SQLite file at `path`, parent dirs included.
pub fn open_connection(path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

/// Initialise the calendar schema in `conn`.
///
/// Safe to call on every startup: uses `IF NOT EXISTS` throughout.
/// Timestamps are integer UTC microseconds so range predicates compare
/// numerically.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS events (
            id           TEXT    NOT NULL PRIMARY KEY,
            title        TEXT    NOT NULL,
            description  TEXT    NOT NULL DEFAULT '',
            start_time   INTEGER NOT NULL,
            end_time     INTEGER NOT NULL,
            user_id      TEXT    NOT NULL,
            reminder_at  INTEGER            -- NULL means no reminder
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_events_start ON events (start_time);
        CREATE INDEX IF NOT EXISTS idx_events_user_start ON events (user_id, start_time);

        CREATE TABLE IF NOT EXISTS notifications (
            id           TEXT    NOT NULL PRIMARY KEY,
            event_id     TEXT    NOT NULL,
            event_title  TEXT    NOT NULL,
            user_id      TEXT    NOT NULL,
            message      TEXT    NOT NULL,
            notify_at    INTEGER NOT NULL,
            created_at   INTEGER NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications (user_id, notify_at);
        ",
    )?;
    Ok(())
}
