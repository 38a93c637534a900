use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use std::convert::Infallible;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};

use crate::models::ConnectionStatus;
use crate::state::SharedState;

/// GET /api/status — connection indicator for the backend API.
pub async fn api_status(State(state): State<SharedState>) -> Json<ConnectionStatus> {
    Json(ConnectionStatus::from_liveness(&state.status.snapshot()))
}

/// POST /api/status/refresh — the "retry connection" button.
pub async fn refresh_status(State(state): State<SharedState>) -> Json<ConnectionStatus> {
    state.status.refresh().await;
    Json(ConnectionStatus::from_liveness(&state.status.snapshot()))
}

/// GET /api/status/stream — SSE stream pushing the indicator whenever the
/// liveness controller's state changes.
pub async fn status_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = WatchStream::new(state.status.subscribe()).map(|snapshot| {
        let status = ConnectionStatus::from_liveness(&snapshot);
        let data = serde_json::to_string(&status).unwrap_or_default();
        Ok(Event::default().event("status").data(data))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
