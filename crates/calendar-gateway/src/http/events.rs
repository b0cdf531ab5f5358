//! Event CRUD endpoints.
//!
//! | Method | Path           | Success |
//! |--------|----------------|---------|
//! | GET    | `/events`      | 200     |
//! | POST   | `/events`      | 201     |
//! | GET    | `/events/{id}` | 200     |
//! | PUT    | `/events/{id}` | 200     |
//! | DELETE | `/events/{id}` | 204     |
//!
//! Reminders travel as `notify_before` (seconds before `start_time`) and are
//! stored as an absolute `reminder_at`.
//!
//! Errors: `{ "error": "...", "code": "..." }` with 400 for bad input, 404 for
//! unknown IDs, 409 for a busy slot and 500 otherwise.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use calendar_core::Event;
use calendar_storage::StorageError;
use chrono::{DateTime, Months, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::app::AppState;

/// Body of `POST /events` and `PUT /events/{id}`.
#[derive(Debug, Deserialize)]
pub struct EventBody {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub user_id: String,
    /// Seconds before `start_time`; absent means no reminder.
    #[serde(default)]
    pub notify_before: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct EventView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_before: Option<i64>,
}

impl From<Event> for EventView {
    fn from(event: Event) -> Self {
        let notify_before = event
            .reminder_at
            .map(|r| (event.start_time - r).num_seconds());
        Self {
            id: event.id,
            title: event.title,
            description: event.description,
            start_time: event.start_time,
            end_time: event.end_time,
            user_id: event.user_id,
            notify_before,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventList {
    pub events: Vec<EventView>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: &'static str,
}

type Failure = (StatusCode, Json<ApiError>);

fn bad_request(reason: impl Into<String>) -> Failure {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError {
            error: reason.into(),
            code: "INVALID_REQUEST",
        }),
    )
}

fn storage_failure(err: StorageError) -> Failure {
    let status = match &err {
        StorageError::InvalidEvent(_) => StatusCode::BAD_REQUEST,
        StorageError::EventNotFound { .. } => StatusCode::NOT_FOUND,
        StorageError::DateBusy => StatusCode::CONFLICT,
        StorageError::Database(_) | StorageError::Io(_) => {
            error!(error = %err, "event store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ApiError {
            error: err.to_string(),
            code: err.code(),
        }),
    )
}

impl EventBody {
    fn into_event(self, id: String) -> Result<Event, Failure> {
        let reminder_at = match self.notify_before {
            Some(secs) if secs < 0 => {
                return Err(bad_request("notify_before must not be negative"));
            }
            Some(secs) => {
                let offset = TimeDelta::try_seconds(secs)
                    .ok_or_else(|| bad_request("notify_before is out of range"))?;
                Some(
                    self.start_time
                        .checked_sub_signed(offset)
                        .ok_or_else(|| bad_request("notify_before is out of range"))?,
                )
            }
            None => None,
        };
        Ok(Event {
            id,
            title: self.title,
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
            user_id: self.user_id,
            reminder_at,
        })
    }
}

/// GET /events?from&to: events starting inside `[from, to]`.
///
/// Defaults to one month either side of now.
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<EventList>, Failure> {
    let Query(query) = query.map_err(|e| bad_request(e.body_text()))?;
    let now = Utc::now();
    let from = query
        .from
        .unwrap_or_else(|| now.checked_sub_months(Months::new(1)).unwrap_or(now));
    let to = query
        .to
        .unwrap_or_else(|| now.checked_add_months(Months::new(1)).unwrap_or(now));
    if from > to {
        return Err(bad_request("from must not be after to"));
    }

    let mut events = state
        .events
        .list_events(from, to)
        .await
        .map_err(storage_failure)?;
    events.sort_by_key(|e| e.start_time);

    Ok(Json(EventList {
        events: events.into_iter().map(EventView::from).collect(),
    }))
}

/// POST /events: create an event starting in the future.
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    body: Result<Json<EventBody>, JsonRejection>,
) -> Result<(StatusCode, Json<EventView>), Failure> {
    let Json(body) = body.map_err(|e| bad_request(e.body_text()))?;
    if body.start_time <= Utc::now() {
        return Err(bad_request("start_time must be in the future"));
    }

    let event = body.into_event(String::new())?;
    let created = state
        .events
        .create_event(event)
        .await
        .map_err(storage_failure)?;
    info!(event_id = %created.id, user_id = %created.user_id, "event created");

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /events/{id}
pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<EventView>, Failure> {
    let event = state.events.get_event(&id).await.map_err(storage_failure)?;
    Ok(Json(event.into()))
}

/// PUT /events/{id}: replace an event in place.
pub async fn update_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<EventBody>, JsonRejection>,
) -> Result<Json<EventView>, Failure> {
    let Json(body) = body.map_err(|e| bad_request(e.body_text()))?;
    let event = body.into_event(id)?.at_storage_precision();
    state
        .events
        .update_event(event.clone())
        .await
        .map_err(storage_failure)?;
    info!(event_id = %event.id, "event updated");

    Ok(Json(event.into()))
}

/// DELETE /events/{id}
pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, Failure> {
    state
        .events
        .delete_event(&id)
        .await
        .map_err(storage_failure)?;
    info!(event_id = %id, "event deleted");
    Ok(StatusCode::NO_CONTENT)
}
