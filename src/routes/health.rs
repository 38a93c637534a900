use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{ConnectionPhase, ConnectionStatus};
use crate::poll::PollPhase;
use crate::state::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub api_url: String,
    pub connection: ConnectionStatus,
    pub runs: RunsHealth,
    pub watched_runs: usize,
    pub dashboard: DashboardInfo,
}

#[derive(Serialize)]
pub struct RunsHealth {
    pub phase: PollPhase,
    pub count: Option<usize>,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct DashboardInfo {
    pub version: String,
    pub refresh_interval_ms: u128,
    pub status_interval_ms: u128,
    pub request_timeout_ms: u128,
}

/// Overall status from the liveness indicator and whether the runs list is
/// currently failing. Pure so it can be tested without a backend.
pub fn determine_overall_status(connection: ConnectionPhase, runs_failing: bool) -> &'static str {
    match connection {
        ConnectionPhase::Error => "unreachable",
        ConnectionPhase::Connected if runs_failing => "degraded",
        ConnectionPhase::Connected => "healthy",
        ConnectionPhase::Checking => "checking",
    }
}

/// GET /health
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let connection = ConnectionStatus::from_liveness(&state.status.snapshot());
    let runs = state.runs.snapshot();
    let watched_runs = state.details.read().await.len();

    Json(HealthResponse {
        status: determine_overall_status(connection.phase, runs.phase == PollPhase::Error)
            .to_string(),
        api_url: state.resolver.base().to_string(),
        connection,
        runs: RunsHealth {
            phase: runs.phase,
            count: runs.data.as_ref().map(Vec::len),
            consecutive_failures: runs.consecutive_failures,
            last_success_at: runs.last_success_at,
        },
        watched_runs,
        dashboard: DashboardInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            refresh_interval_ms: state.config.refresh_interval.as_millis(),
            status_interval_ms: state.config.status_interval.as_millis(),
            request_timeout_ms: state.config.request_timeout.as_millis(),
        },
    })
}
