use std::sync::Arc;

use axum::{routing::get, Router};
use calendar_storage::EventStore;

/// Central shared state: passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub events: Arc<dyn EventStore>,
}

impl AppState {
    pub fn new(events: Arc<dyn EventStore>) -> Self {
        Self { events }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/events",
            get(crate::http::events::list_events).post(crate::http::events::create_event),
        )
        .route(
            "/events/{id}",
            get(crate::http::events::get_event)
                .put(crate::http::events::update_event)
                .delete(crate::http::events::delete_event),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
