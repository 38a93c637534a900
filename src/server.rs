use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(crate::routes::health::health))
        // API status indicator
        .route("/api/status", get(crate::routes::status::api_status))
        .route(
            "/api/status/refresh",
            post(crate::routes::status::refresh_status),
        )
        .route(
            "/api/status/stream",
            get(crate::routes::status::status_stream),
        )
        // Test runs
        .route("/api/runs", get(crate::routes::runs::list_runs))
        .route("/api/runs/refresh", post(crate::routes::runs::refresh_runs))
        .route("/api/runs/{id}", get(crate::routes::runs::get_run))
        .route(
            "/api/runs/{id}/refresh",
            post(crate::routes::runs::refresh_run),
        )
        // Events
        .route("/events/history", get(crate::routes::events::event_history))
        .route("/events/stream", get(crate::routes::events::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
