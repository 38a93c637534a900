use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::poll::{PollPhase, PollSnapshot};

/// Canonical run/phase status. Anything the backend sends outside the known
/// set collapses to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Pending,
    Running,
    Failed,
    #[default]
    Unknown,
}

impl TestStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "passed" => TestStatus::Passed,
            "pending" => TestStatus::Pending,
            "running" => TestStatus::Running,
            "failed" => TestStatus::Failed,
            _ => TestStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Pending => "pending",
            TestStatus::Running => "running",
            TestStatus::Failed => "failed",
            TestStatus::Unknown => "unknown",
        }
    }

    /// Upper-case label used for display.
    pub fn label(&self) -> &'static str {
        match self {
            TestStatus::Passed => "PASSED",
            TestStatus::Pending => "PENDING",
            TestStatus::Running => "RUNNING",
            TestStatus::Failed => "FAILED",
            TestStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunSummary {
    pub id: i64,
    pub name: String,
    pub unit_id: String,
    pub unit_serial: String,
    pub status: TestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPhase {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub status: TestStatus,
    pub duration_seconds: f64,
    pub measurements: Map<String, Value>,
    pub test_run_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A run together with its phases, as shown on the run detail view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunDetail {
    pub run: TestRunSummary,
    pub phases: Vec<TestPhase>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub running: usize,
    pub pending: usize,
    pub unknown: usize,
    pub total_duration_seconds: f64,
}

impl RunDetail {
    pub fn phase_summary(&self) -> PhaseSummary {
        let mut summary = PhaseSummary {
            total: self.phases.len(),
            ..PhaseSummary::default()
        };
        for phase in &self.phases {
            match phase.status {
                TestStatus::Passed => summary.passed += 1,
                TestStatus::Failed => summary.failed += 1,
                TestStatus::Running => summary.running += 1,
                TestStatus::Pending => summary.pending += 1,
                TestStatus::Unknown => summary.unknown += 1,
            }
            summary.total_duration_seconds += phase.duration_seconds;
        }
        summary
    }
}

/// Liveness payload of `GET /`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceInfo {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    Checking,
    Connected,
    Error,
}

/// Ephemeral connection indicator derived from a poll snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub phase: ConnectionPhase,
    pub message: String,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

impl ConnectionStatus {
    pub fn from_snapshot<T>(
        snapshot: &PollSnapshot<T>,
        connected_message: impl FnOnce(Option<&T>) -> String,
    ) -> Self {
        let (phase, message) = match snapshot.phase {
            PollPhase::Idle | PollPhase::Loading => (
                ConnectionPhase::Checking,
                "Checking backend connection...".to_string(),
            ),
            PollPhase::Ready => (
                ConnectionPhase::Connected,
                connected_message(snapshot.data.as_ref()),
            ),
            PollPhase::Error => (
                ConnectionPhase::Error,
                snapshot
                    .error
                    .clone()
                    .unwrap_or_else(|| "Unknown error occurred".to_string()),
            ),
        };

        ConnectionStatus {
            phase,
            message,
            last_checked_at: snapshot.last_checked_at,
            consecutive_failures: snapshot.consecutive_failures,
        }
    }

    pub fn from_liveness(snapshot: &PollSnapshot<ServiceInfo>) -> Self {
        Self::from_snapshot(snapshot, |info| {
            let message = info.map(|i| i.message.as_str()).unwrap_or("");
            format!("Connected to backend API. {}", message)
                .trim_end()
                .to_string()
        })
    }
}
