use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;

use nottofu_dashboard::config::{ClientConfig, MAX_DETAIL_CONTROLLERS};
use nottofu_dashboard::event_log::{EventLevel, EventSource};
use nottofu_dashboard::fetch::FetchFailure;
use nottofu_dashboard::models::RunDetail;
use nottofu_dashboard::poll::{PollController, PollOptions, PollPhase, RetryPolicy};
use nottofu_dashboard::state::{DashboardState, DetailControllers};

fn unreachable_config() -> ClientConfig {
    ClientConfig {
        api_url: "http://127.0.0.1:9".to_string(),
        request_timeout: Duration::from_millis(200),
        ..ClientConfig::default()
    }
}

fn dummy_detail(name: &str) -> PollController<RunDetail> {
    let source = |_now: DateTime<Utc>| -> BoxFuture<'static, Result<RunDetail, FetchFailure>> {
        async {
            Err(FetchFailure::NetworkError {
                message: "offline".to_string(),
            })
        }
        .boxed()
    };
    PollController::new(
        name,
        source,
        PollOptions {
            interval: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        },
    )
}

#[tokio::test]
async fn test_state_creation() {
    let state = DashboardState::new(unreachable_config()).unwrap();

    assert_eq!(state.runs.snapshot().phase, PollPhase::Idle);
    assert_eq!(state.status.snapshot().phase, PollPhase::Idle);
    assert!(!state.runs.is_active());
    assert!(state.details.read().await.is_empty());
    assert_eq!(state.resolver.base(), "http://127.0.0.1:9");
    assert_eq!(state.fetcher.timeout(), Duration::from_millis(200));
    assert_eq!(state.runs.options().interval, Duration::from_secs(5));
    assert_eq!(state.status.options().interval, Duration::from_secs(10));
}

#[test]
fn test_detail_controllers_evict_oldest() {
    let mut details = DetailControllers::new(2);

    assert!(details.insert("1".to_string(), dummy_detail("run 1")).is_none());
    assert!(details.insert("2".to_string(), dummy_detail("run 2")).is_none());
    let evicted = details.insert("3".to_string(), dummy_detail("run 3")).unwrap();

    assert_eq!(evicted.name(), "run 1");
    assert_eq!(details.len(), 2);
    assert!(details.get("1").is_none());
    assert!(details.get("2").is_some());
    assert!(details.get("3").is_some());
}

#[test]
fn test_detail_controllers_replace_same_id() {
    let mut details = DetailControllers::new(2);
    details.insert("1".to_string(), dummy_detail("first"));
    let replaced = details.insert("1".to_string(), dummy_detail("second")).unwrap();

    assert_eq!(replaced.name(), "first");
    assert_eq!(details.len(), 1);
    assert_eq!(details.get("1").unwrap().name(), "second");
}

#[tokio::test]
async fn test_detail_reuses_controller_per_run() {
    let state = Arc::new(DashboardState::new(unreachable_config()).unwrap());

    let first = state.detail("42").await;
    let again = state.detail("42").await;
    assert_eq!(first.name(), "run 42");
    assert_eq!(again.name(), "run 42");
    assert!(first.is_active());
    assert_eq!(state.details.read().await.len(), 1);

    state.shutdown().await;
    assert!(!first.is_active());
    assert!(state.details.read().await.is_empty());
}

#[tokio::test]
async fn test_detail_map_is_bounded() {
    let state = Arc::new(DashboardState::new(unreachable_config()).unwrap());

    let oldest = state.detail("0").await;
    for id in 1..=MAX_DETAIL_CONTROLLERS {
        state.detail(&id.to_string()).await;
    }

    assert_eq!(state.details.read().await.len(), MAX_DETAIL_CONTROLLERS);
    assert!(!oldest.is_active(), "evicted controller is stopped");
    state.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_controllers_and_logs() {
    let state = Arc::new(DashboardState::new(unreachable_config()).unwrap());
    state.start();
    assert!(state.runs.is_active());
    assert!(state.status.is_active());

    state.shutdown().await;
    assert!(!state.runs.is_active());
    assert!(!state.status.is_active());

    let history = state.events.history().await;
    assert!(history.iter().any(|e| e.source == EventSource::Dashboard
        && e.level == EventLevel::Info
        && e.message == "Poll controllers stopped"));
}
