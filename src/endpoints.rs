//! Absolute URL construction for the backend API.
//!
//! Every call site goes through [`EndpointResolver`], so the base address and
//! the test-run collection segment are configured in exactly one place.

use std::fmt;

use crate::config::DEFAULT_RUNS_PATH;

/// Logical backend endpoints. Parameterised variants carry the id already
/// rendered as a path segment; no validation is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Root,
    Status,
    TestRuns,
    TestPhases,
    TestRun(String),
    TestRunPhases(String),
    UpdateTestRunStatus(String),
}

impl Endpoint {
    pub fn test_run(id: impl fmt::Display) -> Self {
        Endpoint::TestRun(id.to_string())
    }

    pub fn test_run_phases(id: impl fmt::Display) -> Self {
        Endpoint::TestRunPhases(id.to_string())
    }

    pub fn update_test_run_status(id: impl fmt::Display) -> Self {
        Endpoint::UpdateTestRunStatus(id.to_string())
    }

    /// Path relative to the API base, using `runs` as the collection segment.
    pub fn path(&self, runs: &str) -> String {
        match self {
            Endpoint::Root => "/".to_string(),
            Endpoint::Status => "/status".to_string(),
            Endpoint::TestRuns => format!("/{}/", runs),
            Endpoint::TestPhases => "/phases/".to_string(),
            Endpoint::TestRun(id) => format!("/{}/{}", runs, id),
            Endpoint::TestRunPhases(id) => format!("/{}/{}/phases", runs, id),
            Endpoint::UpdateTestRunStatus(id) => format!("/{}/{}/status", runs, id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointResolver {
    base: String,
    runs: String,
}

impl EndpointResolver {
    pub fn new(base: &str, runs_path: &str) -> Self {
        let runs = runs_path.trim_matches('/');
        Self {
            base: base.trim_end_matches('/').to_string(),
            runs: if runs.is_empty() {
                DEFAULT_RUNS_PATH.to_string()
            } else {
                runs.to_string()
            },
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn resolve(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.base, endpoint.path(&self.runs))
    }
}
