use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use crate::endpoints::{Endpoint, EndpointResolver};
use crate::fetch::{Fetch, FetchFailure};
use crate::models::{RunDetail, ServiceInfo, TestRunSummary};
use crate::normalize::{normalize_phases, normalize_run, normalize_runs, normalize_service_info};
use crate::poll::DataSource;

/// `GET /runs/` → run list, most recent first.
pub struct RunsSource<F> {
    resolver: EndpointResolver,
    fetcher: F,
}

impl<F: Fetch> RunsSource<F> {
    pub fn new(resolver: EndpointResolver, fetcher: F) -> Self {
        Self { resolver, fetcher }
    }
}

impl<F: Fetch> DataSource<Vec<TestRunSummary>> for RunsSource<F> {
    fn load(&self, now: DateTime<Utc>) -> BoxFuture<'_, Result<Vec<TestRunSummary>, FetchFailure>> {
        Box::pin(async move {
            let url = self.resolver.resolve(&Endpoint::TestRuns);
            let raw = self.fetcher.get_json(&url).await?;
            Ok(normalize_runs(&raw, now))
        })
    }
}

/// `GET /runs/{id}` followed by `GET /runs/{id}/phases`. Either request
/// failing fails the whole load.
pub struct RunDetailSource<F> {
    resolver: EndpointResolver,
    fetcher: F,
    run_id: String,
}

impl<F: Fetch> RunDetailSource<F> {
    pub fn new(resolver: EndpointResolver, fetcher: F, run_id: impl Into<String>) -> Self {
        Self {
            resolver,
            fetcher,
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

impl<F: Fetch> DataSource<RunDetail> for RunDetailSource<F> {
    fn load(&self, now: DateTime<Utc>) -> BoxFuture<'_, Result<RunDetail, FetchFailure>> {
        Box::pin(async move {
            let run_url = self.resolver.resolve(&Endpoint::test_run(&self.run_id));
            let run = normalize_run(&self.fetcher.get_json(&run_url).await?, now);

            let phases_url = self.resolver.resolve(&Endpoint::test_run_phases(&self.run_id));
            let phases = normalize_phases(&self.fetcher.get_json(&phases_url).await?, run.id, now);

            Ok(RunDetail { run, phases })
        })
    }
}

/// `GET /` liveness check behind the API status indicator.
pub struct LivenessSource<F> {
    resolver: EndpointResolver,
    fetcher: F,
}

impl<F: Fetch> LivenessSource<F> {
    pub fn new(resolver: EndpointResolver, fetcher: F) -> Self {
        Self { resolver, fetcher }
    }
}

impl<F: Fetch> DataSource<ServiceInfo> for LivenessSource<F> {
    fn load(&self, _now: DateTime<Utc>) -> BoxFuture<'_, Result<ServiceInfo, FetchFailure>> {
        Box::pin(async move {
            let url = self.resolver.resolve(&Endpoint::Root);
            let raw = self.fetcher.get_json(&url).await?;
            Ok(normalize_service_info(&raw))
        })
    }
}
