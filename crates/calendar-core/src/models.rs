//! Calendar data model: shared by the event store, the scheduler and the storer.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// A calendar entry owned by a single user.
///
/// `id` is empty until the event store assigns one in `create_event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub user_id: String,
    /// Absolute instant at which a reminder should fire. `None` disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_at: Option<DateTime<Utc>>,
}

impl Event {
    /// Check the field-level invariants every stored event must satisfy.
    ///
    /// Returns a human-readable reason on failure; stores wrap it into their
    /// own `InvalidEvent` error.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title is required".to_string());
        }
        if self.user_id.trim().is_empty() {
            return Err("user_id is required".to_string());
        }
        if self.end_time < self.start_time {
            return Err("end_time must not be before start_time".to_string());
        }
        if let Some(reminder) = self.reminder_at {
            if reminder > self.start_time {
                return Err("reminder_at must not be after start_time".to_string());
            }
        }
        Ok(())
    }

    /// Truncate every timestamp to whole microseconds, the finest precision
    /// the SQLite backend keeps. Stores apply this before validating, so a
    /// slot is the same slot on every backend.
    pub fn at_storage_precision(mut self) -> Self {
        self.start_time = self.start_time.trunc_subsecs(6);
        self.end_time = self.end_time.trunc_subsecs(6);
        self.reminder_at = self.reminder_at.map(|r| r.trunc_subsecs(6));
        self
    }

    /// True when both events claim the same slot: same user, same start instant.
    pub fn collides_with(&self, other: &Event) -> bool {
        self.user_id == other.user_id && self.start_time == other.start_time
    }
}

/// A due reminder for one event, as it travels through the broker.
///
/// The serialized form is the wire payload: a flat JSON object whose
/// timestamps are RFC 3339 strings. Unknown fields are ignored on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub event_id: String,
    pub event_title: String,
    pub user_id: String,
    pub message: String,
    pub notify_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn event() -> Event {
        let start = Utc::now() + Duration::hours(1);
        Event {
            id: String::new(),
            title: "standup".to_string(),
            description: String::new(),
            start_time: start,
            end_time: start + Duration::minutes(15),
            user_id: "alice".to_string(),
            reminder_at: Some(start - Duration::minutes(5)),
        }
    }

    #[test]
    fn valid_event_passes() {
        assert!(event().validate().is_ok());
    }

    #[test]
    fn empty_title_is_rejected() {
        let mut e = event();
        e.title = "  ".to_string();
        assert_eq!(e.validate().unwrap_err(), "title is required");
    }

    #[test]
    fn end_before_start_is_rejected() {
        let mut e = event();
        e.end_time = e.start_time - Duration::minutes(1);
        assert!(e.validate().is_err());
    }

    #[test]
    fn reminder_after_start_is_rejected() {
        let mut e = event();
        e.reminder_at = Some(e.start_time + Duration::seconds(1));
        assert!(e.validate().is_err());
    }

    #[test]
    fn storage_precision_drops_sub_microsecond_digits() {
        let mut e = event();
        e.start_time =
            Utc.with_ymd_and_hms(2030, 3, 15, 9, 0, 0).unwrap() + Duration::nanoseconds(1_100);
        e.end_time = e.start_time + Duration::nanoseconds(999);
        e.reminder_at = Some(e.start_time - Duration::nanoseconds(1));

        let e = e.at_storage_precision();
        assert_eq!(e.start_time.timestamp_subsec_nanos(), 1_000);
        assert_eq!(e.end_time.timestamp_subsec_nanos(), 2_000);
        assert_eq!(e.reminder_at, Some(e.start_time));
        assert!(e.validate().is_ok());
    }

    #[test]
    fn collision_needs_same_user_and_start() {
        let a = event();
        let mut b = a.clone();
        b.id = "other".to_string();
        assert!(a.collides_with(&b));

        b.user_id = "bob".to_string();
        assert!(!a.collides_with(&b));
    }

    #[test]
    fn notification_decodes_with_unknown_fields() {
        let json = r#"{
            "id": "n1", "event_id": "e1", "event_title": "standup",
            "user_id": "alice", "message": "hi",
            "notify_at": "2026-01-01T10:00:00Z",
            "created_at": "2026-01-01T10:00:00Z",
            "priority": "high"
        }"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.event_id, "e1");
        assert_eq!(n.notify_at.to_rfc3339(), "2026-01-01T10:00:00+00:00");
    }

    #[test]
    fn notification_missing_field_fails_to_decode() {
        let json = r#"{"id": "n1", "event_id": "e1"}"#;
        assert!(serde_json::from_str::<Notification>(json).is_err());
    }
}
