use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::time::Duration;

use crate::error::DashboardError;
use crate::fetch::FetchFailure;
use crate::models::{PhaseSummary, RunDetail, TestRunSummary};
use crate::poll::{PollController, PollSnapshot};
use crate::state::SharedState;

#[derive(Serialize)]
pub struct RunDetailResponse {
    #[serde(flatten)]
    pub snapshot: PollSnapshot<RunDetail>,
    pub summary: Option<PhaseSummary>,
}

/// GET /api/runs — current snapshot of the run list.
pub async fn list_runs(State(state): State<SharedState>) -> Json<PollSnapshot<Vec<TestRunSummary>>> {
    Json(state.runs.snapshot())
}

/// POST /api/runs/refresh
pub async fn refresh_runs(
    State(state): State<SharedState>,
) -> Json<PollSnapshot<Vec<TestRunSummary>>> {
    state.runs.refresh().await;
    Json(state.runs.snapshot())
}

/// GET /api/runs/{id} — starts watching the run on first access and waits
/// for its first load.
pub async fn get_run(
    State(state): State<SharedState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunDetailResponse>, DashboardError> {
    let controller = state.detail(&run_id).await;
    // Run + phases: two requests, each bounded by the request timeout.
    let snapshot = wait_for_first_load(&controller, state.config.request_timeout * 2).await;
    detail_response(run_id, snapshot)
}

/// POST /api/runs/{id}/refresh
pub async fn refresh_run(
    State(state): State<SharedState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunDetailResponse>, DashboardError> {
    let controller = state.detail(&run_id).await;
    controller.refresh().await;
    detail_response(run_id, controller.snapshot())
}

async fn wait_for_first_load(
    controller: &PollController<RunDetail>,
    budget: Duration,
) -> PollSnapshot<RunDetail> {
    let mut rx = controller.subscribe();
    let _ = tokio::time::timeout(budget, async {
        loop {
            if !rx.borrow_and_update().is_first_load() {
                break;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    })
    .await;
    controller.snapshot()
}

fn detail_response(
    run_id: String,
    snapshot: PollSnapshot<RunDetail>,
) -> Result<Json<RunDetailResponse>, DashboardError> {
    let missing = snapshot.data.is_none()
        && snapshot
            .last_failure
            .as_ref()
            .is_some_and(FetchFailure::is_not_found);
    if missing {
        return Err(DashboardError::RunNotFound(run_id));
    }

    let summary = snapshot.data.as_ref().map(RunDetail::phase_summary);
    Ok(Json(RunDetailResponse { snapshot, summary }))
}
