// Contract tests run against every EventStore backend.

use calendar_core::Event;
use calendar_storage::{EventStore, MemoryEventStore, SqliteEventStore, StorageError};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::Connection;

fn backends() -> Vec<(&'static str, Box<dyn EventStore>)> {
    vec![
        ("memory", Box::new(MemoryEventStore::new())),
        (
            "sqlite",
            Box::new(SqliteEventStore::new(Connection::open_in_memory().unwrap()).unwrap()),
        ),
    ]
}

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 3, 15, 9, 0, 0).unwrap()
}

fn event(user: &str, start: DateTime<Utc>) -> Event {
    Event {
        id: String::new(),
        title: "planning".to_string(),
        description: "quarterly".to_string(),
        start_time: start,
        end_time: start + Duration::hours(1),
        user_id: user.to_string(),
        reminder_at: Some(start - Duration::minutes(10)),
    }
}

#[tokio::test]
async fn create_assigns_id_and_get_returns_it() {
    for (name, store) in backends() {
        let created = store.create_event(event("alice", base())).await.unwrap();
        assert!(!created.id.is_empty(), "{name}");

        let fetched = store.get_event(&created.id).await.unwrap();
        assert_eq!(fetched, created, "{name}");
    }
}

#[tokio::test]
async fn same_user_and_start_is_busy() {
    for (name, store) in backends() {
        store.create_event(event("alice", base())).await.unwrap();

        let err = store.create_event(event("alice", base())).await.unwrap_err();
        assert!(matches!(err, StorageError::DateBusy), "{name}: {err}");

        // Another user, or another instant, is fine.
        store.create_event(event("bob", base())).await.unwrap();
        store
            .create_event(event("alice", base() + Duration::minutes(30)))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn invalid_event_is_rejected() {
    for (name, store) in backends() {
        let mut bad = event("alice", base());
        bad.title.clear();
        let err = store.create_event(bad).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidEvent(_)), "{name}: {err}");
    }
}

#[tokio::test]
async fn update_preserves_identity_and_checks_slot() {
    for (name, store) in backends() {
        let first = store.create_event(event("alice", base())).await.unwrap();
        let second = store
            .create_event(event("alice", base() + Duration::hours(2)))
            .await
            .unwrap();

        // Moving the second event onto the first one's slot collides.
        let mut moved = second.clone();
        moved.start_time = first.start_time;
        moved.end_time = first.end_time;
        moved.reminder_at = None;
        let err = store.update_event(moved).await.unwrap_err();
        assert!(matches!(err, StorageError::DateBusy), "{name}: {err}");

        // Updating an event onto its own slot is not a collision.
        let mut renamed = first.clone();
        renamed.title = "planning (moved room)".to_string();
        store.update_event(renamed.clone()).await.unwrap();
        assert_eq!(store.get_event(&first.id).await.unwrap(), renamed, "{name}");
    }
}

#[tokio::test]
async fn update_of_unknown_id_is_not_found() {
    for (name, store) in backends() {
        let mut ghost = event("alice", base());
        ghost.id = "does-not-exist".to_string();
        let err = store.update_event(ghost).await.unwrap_err();
        assert!(matches!(err, StorageError::EventNotFound { .. }), "{name}: {err}");
    }
}

#[tokio::test]
async fn second_delete_reports_not_found() {
    for (name, store) in backends() {
        let created = store.create_event(event("alice", base())).await.unwrap();

        store.delete_event(&created.id).await.unwrap();
        let err = store.delete_event(&created.id).await.unwrap_err();
        assert!(matches!(err, StorageError::EventNotFound { .. }), "{name}: {err}");

        let err = store.get_event(&created.id).await.unwrap_err();
        assert!(matches!(err, StorageError::EventNotFound { .. }), "{name}: {err}");
    }
}

#[tokio::test]
async fn list_is_inclusive_at_both_ends() {
    for (name, store) in backends() {
        let from = base();
        let to = base() + Duration::hours(4);
        let before = store
            .create_event(event("alice", from - Duration::seconds(1)))
            .await
            .unwrap();
        let at_from = store.create_event(event("alice", from)).await.unwrap();
        let inside = store
            .create_event(event("bob", from + Duration::hours(2)))
            .await
            .unwrap();
        let at_to = store.create_event(event("alice", to)).await.unwrap();
        let after = store
            .create_event(event("alice", to + Duration::seconds(1)))
            .await
            .unwrap();

        let mut ids: Vec<String> = store
            .list_events(from, to)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        ids.sort();
        let mut expected = vec![at_from.id, inside.id, at_to.id];
        expected.sort();
        assert_eq!(ids, expected, "{name}");
        assert!(!ids.contains(&before.id) && !ids.contains(&after.id), "{name}");
    }
}

#[tokio::test]
async fn event_without_reminder_round_trips() {
    for (name, store) in backends() {
        let mut e = event("carol", base());
        e.reminder_at = None;
        let created = store.create_event(e).await.unwrap();
        assert_eq!(
            store.get_event(&created.id).await.unwrap().reminder_at,
            None,
            "{name}"
        );
    }
}

#[tokio::test]
async fn sub_microsecond_instants_share_a_slot_on_every_backend() {
    let start = base() + Duration::nanoseconds(100);
    for (name, store) in backends() {
        let created = store.create_event(event("alice", start)).await.unwrap();
        assert_eq!(created.start_time, base(), "{name}");
        assert_eq!(store.get_event(&created.id).await.unwrap(), created, "{name}");

        let err = store
            .create_event(event("alice", start + Duration::nanoseconds(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DateBusy), "{name}: {err}");
    }
}
