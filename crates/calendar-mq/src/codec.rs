//! Wire payload for notifications: a flat JSON object.

use calendar_core::Notification;
use tracing::warn;

use crate::error::MqError;

pub fn encode(notification: &Notification) -> Result<Vec<u8>, MqError> {
    Ok(serde_json::to_vec(notification)?)
}

/// Decode a payload, or log and return `None` if it is not a notification.
///
/// Unknown fields are tolerated; missing or mistyped required fields are not.
pub fn decode(payload: &[u8]) -> Option<Notification> {
    match serde_json::from_slice(payload) {
        Ok(notification) => Some(notification),
        Err(e) => {
            warn!(error = %e, bytes = payload.len(), "dropping malformed notification payload");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn wire_format_is_flat_with_rfc3339_timestamps() {
        let at = Utc.with_ymd_and_hms(2030, 6, 1, 8, 30, 0).unwrap();
        let n = Notification {
            id: "n1".to_string(),
            event_id: "e1".to_string(),
            event_title: "dentist".to_string(),
            user_id: "alice".to_string(),
            message: "Reminder: dentist starts at 09:00".to_string(),
            notify_at: at,
            created_at: at,
        };

        let value: serde_json::Value = serde_json::from_slice(&encode(&n).unwrap()).unwrap();
        assert_eq!(value["event_id"], "e1");
        assert_eq!(value["user_id"], "alice");
        assert_eq!(value["notify_at"], "2030-06-01T08:30:00Z");
        assert_eq!(decode(&encode(&n).unwrap()), Some(n));
    }

    #[test]
    fn garbage_and_mistyped_payloads_are_dropped() {
        assert_eq!(decode(b"not json"), None);
        assert_eq!(
            decode(
                br#"{"id":1,"event_id":"e","event_title":"t","user_id":"u","message":"m",
                     "notify_at":"2030-06-01T08:30:00Z","created_at":"2030-06-01T08:30:00Z"}"#
            ),
            None
        );
    }
}
