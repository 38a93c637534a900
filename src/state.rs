use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::{ClientConfig, MAX_DETAIL_CONTROLLERS};
use crate::endpoints::EndpointResolver;
use crate::error::DashboardError;
use crate::event_log::{EventLevel, EventLog, EventSource};
use crate::fetch::HttpFetcher;
use crate::models::{RunDetail, ServiceInfo, TestRunSummary};
use crate::monitor::spawn_phase_monitor;
use crate::poll::PollController;
use crate::sources::{LivenessSource, RunDetailSource, RunsSource};

pub type SharedState = Arc<DashboardState>;

pub struct DashboardState {
    pub config: ClientConfig,
    pub resolver: EndpointResolver,
    pub fetcher: HttpFetcher,
    pub runs: PollController<Vec<TestRunSummary>>,
    pub status: PollController<ServiceInfo>,
    pub details: RwLock<DetailControllers>,
    pub events: EventLog,
}

/// Run-detail controllers keyed by run id, evicted oldest-first.
pub struct DetailControllers {
    controllers: HashMap<String, PollController<RunDetail>>,
    order: VecDeque<String>,
    capacity: usize,
}

impl DetailControllers {
    pub fn new(capacity: usize) -> Self {
        Self {
            controllers: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, run_id: &str) -> Option<&PollController<RunDetail>> {
        self.controllers.get(run_id)
    }

    /// Insert a controller, returning the one evicted to stay within capacity.
    pub fn insert(
        &mut self,
        run_id: String,
        controller: PollController<RunDetail>,
    ) -> Option<PollController<RunDetail>> {
        if let Some(previous) = self.controllers.insert(run_id.clone(), controller) {
            self.order.retain(|id| id != &run_id);
            self.order.push_back(run_id);
            return Some(previous);
        }
        self.order.push_back(run_id);

        if self.order.len() > self.capacity {
            let oldest = self.order.pop_front()?;
            return self.controllers.remove(&oldest);
        }
        None
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn drain(&mut self) -> Vec<PollController<RunDetail>> {
        self.order.clear();
        self.controllers.drain().map(|(_, c)| c).collect()
    }
}

impl DashboardState {
    pub fn new(config: ClientConfig) -> Result<Self, DashboardError> {
        let resolver = config.resolver();
        let fetcher = HttpFetcher::new(config.request_timeout)?;

        let runs = PollController::new(
            "runs",
            RunsSource::new(resolver.clone(), fetcher.clone()),
            config.data_poll_options(),
        );
        let status = PollController::new(
            "status",
            LivenessSource::new(resolver.clone(), fetcher.clone()),
            config.status_poll_options(),
        );

        Ok(Self {
            config,
            resolver,
            fetcher,
            runs,
            status,
            details: RwLock::new(DetailControllers::new(MAX_DETAIL_CONTROLLERS)),
            events: EventLog::new(),
        })
    }

    /// Start the always-on controllers and their event monitors.
    pub fn start(self: &Arc<Self>) {
        spawn_phase_monitor(
            self.clone(),
            EventSource::Runs,
            "Test runs".to_string(),
            self.runs.subscribe(),
            self.config.retry,
        );
        spawn_phase_monitor(
            self.clone(),
            EventSource::Status,
            "API status".to_string(),
            self.status.subscribe(),
            self.config.retry,
        );
        self.runs.start();
        self.status.start();
    }

    /// Controller for one run's detail view, created and started on first use.
    pub async fn detail(self: &Arc<Self>, run_id: &str) -> PollController<RunDetail> {
        if let Some(controller) = self.details.read().await.get(run_id) {
            return controller.clone();
        }

        let mut details = self.details.write().await;
        // Another request may have created it while we waited for the lock.
        if let Some(controller) = details.get(run_id) {
            return controller.clone();
        }

        let controller = PollController::new(
            format!("run {}", run_id),
            RunDetailSource::new(self.resolver.clone(), self.fetcher.clone(), run_id),
            self.config.data_poll_options(),
        );
        spawn_phase_monitor(
            self.clone(),
            EventSource::Detail,
            format!("Run {}", run_id),
            controller.subscribe(),
            self.config.retry,
        );
        controller.start();
        debug!("Watching run {}", run_id);

        if let Some(evicted) = details.insert(run_id.to_string(), controller.clone()) {
            evicted.stop();
            debug!("Stopped watching {}", evicted.name());
        }
        controller
    }

    pub async fn shutdown(&self) {
        info!("Stopping poll controllers");
        self.runs.stop();
        self.status.stop();
        for controller in self.details.write().await.drain() {
            controller.stop();
        }
        self.events
            .emit(
                EventSource::Dashboard,
                EventLevel::Info,
                "Poll controllers stopped",
            )
            .await;
    }
}
