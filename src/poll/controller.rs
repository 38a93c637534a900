use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::backoff::RetryPolicy;
use super::clock::{Clock, SystemClock};
use crate::fetch::FetchFailure;

/// Fetch plus normalization for one entity type. Implemented by the HTTP
/// sources in [`crate::sources`] and by any
/// `Fn(DateTime<Utc>) -> BoxFuture<'static, Result<T, FetchFailure>>`.
pub trait DataSource<T>: Send + Sync {
    /// `now` is the fallback timestamp for normalization.
    fn load(&self, now: DateTime<Utc>) -> BoxFuture<'_, Result<T, FetchFailure>>;
}

impl<T, F> DataSource<T> for F
where
    F: Fn(DateTime<Utc>) -> BoxFuture<'static, Result<T, FetchFailure>> + Send + Sync,
{
    fn load(&self, now: DateTime<Utc>) -> BoxFuture<'_, Result<T, FetchFailure>> {
        self(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollPhase {
    Idle,
    Loading,
    Ready,
    Error,
}

/// Observable controller state. `data` is the last successful result and
/// survives both `Loading` and `Error`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSnapshot<T> {
    pub phase: PollPhase,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip)]
    pub last_failure: Option<FetchFailure>,
    pub consecutive_failures: u32,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
}

impl<T> PollSnapshot<T> {
    pub fn idle() -> Self {
        Self {
            phase: PollPhase::Idle,
            data: None,
            error: None,
            last_failure: None,
            consecutive_failures: 0,
            last_checked_at: None,
            last_success_at: None,
        }
    }

    /// Loading with nothing to show yet; later loads keep the stale data.
    pub fn is_first_load(&self) -> bool {
        self.phase == PollPhase::Loading && self.data.is_none()
    }
}

/// Owns the Idle/Loading/Ready/Error state machine for one data source.
///
/// Two timers drive it while active: the poll interval (fires from `Idle` or
/// `Ready`) and a single backoff retry (fires from `Error` until the retry
/// ceiling). `refresh()` works in any state. Concurrent polls are not
/// de-duplicated; the last response to land wins.
pub struct PollController<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for PollController<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

struct Shared<T> {
    name: String,
    source: Box<dyn DataSource<T>>,
    options: PollOptions,
    clock: Box<dyn Clock>,
    state: watch::Sender<PollSnapshot<T>>,
    active: AtomicBool,
    // Bumped by stop(); a poll started under an older generation is discarded.
    generation: AtomicU64,
    interval_task: Mutex<Option<JoinHandle<()>>>,
    retry_task: Mutex<Option<JoinHandle<()>>>,
}

impl<T> PollController<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<S>(name: impl Into<String>, source: S, options: PollOptions) -> Self
    where
        S: DataSource<T> + 'static,
    {
        Self::with_clock(name, source, options, SystemClock)
    }

    pub fn with_clock<S, C>(name: impl Into<String>, source: S, options: PollOptions, clock: C) -> Self
    where
        S: DataSource<T> + 'static,
        C: Clock + 'static,
    {
        let (state, _) = watch::channel(PollSnapshot::idle());
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                source: Box::new(source),
                options,
                clock: Box::new(clock),
                state,
                active: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                interval_task: Mutex::new(None),
                retry_task: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn options(&self) -> PollOptions {
        self.shared.options
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> PollSnapshot<T> {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot<T>> {
        self.shared.state.subscribe()
    }

    /// Enter `Loading` immediately and start the poll interval. No-op when
    /// already active.
    pub fn start(&self) {
        if self.shared.active.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(
            "[{}] poll controller started (interval {}ms)",
            self.shared.name,
            self.shared.options.interval.as_millis()
        );

        Shared::launch(&self.shared);

        let shared = self.shared.clone();
        let period = shared.options.interval;
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !shared.active.load(Ordering::SeqCst) {
                    break;
                }
                let phase = shared.state.borrow().phase;
                match phase {
                    PollPhase::Idle | PollPhase::Ready => Shared::launch(&shared),
                    PollPhase::Loading | PollPhase::Error => {
                        debug!("[{}] interval tick skipped in {:?}", shared.name, phase)
                    }
                }
            }
        });
        replace_task(&self.shared.interval_task, Some(handle));
    }

    /// Cancel both timers and reset to `Idle`. An in-flight fetch is left to
    /// finish but its result is discarded.
    pub fn stop(&self) {
        let was_active = self.shared.active.swap(false, Ordering::SeqCst);
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        replace_task(&self.shared.interval_task, None);
        replace_task(&self.shared.retry_task, None);
        self.shared.state.send_replace(PollSnapshot::idle());
        if was_active {
            info!("[{}] poll controller stopped", self.shared.name);
        }
    }

    /// Poll now, whatever the current phase. Resolves once the result has
    /// been committed (or discarded by a concurrent `stop()`).
    pub async fn refresh(&self) {
        debug!("[{}] manual refresh", self.shared.name);
        let generation = self.shared.begin_loading();
        Shared::complete(self.shared.clone(), generation).await;
    }
}

impl<T> Shared<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn begin_loading(&self) -> u64 {
        self.state.send_modify(|s| s.phase = PollPhase::Loading);
        self.generation.load(Ordering::SeqCst)
    }

    /// Start a poll on its own task so cancelling a timer never cancels the
    /// fetch itself.
    fn launch(shared: &Arc<Self>) {
        let generation = shared.begin_loading();
        tokio::spawn(Self::complete(shared.clone(), generation));
    }

    async fn complete(shared: Arc<Self>, generation: u64) {
        let result = shared.source.load(shared.clock.now()).await;

        if shared.generation.load(Ordering::SeqCst) != generation {
            debug!("[{}] discarding result of a stopped poll", shared.name);
            return;
        }

        let checked_at = shared.clock.now();
        match result {
            Ok(data) => {
                let mut recovered_from = 0;
                shared.state.send_modify(|s| {
                    recovered_from = s.consecutive_failures;
                    s.phase = PollPhase::Ready;
                    s.data = Some(data);
                    s.error = None;
                    s.last_failure = None;
                    s.consecutive_failures = 0;
                    s.last_checked_at = Some(checked_at);
                    s.last_success_at = Some(checked_at);
                });
                replace_task(&shared.retry_task, None);
                if recovered_from > 0 {
                    info!(
                        "[{}] recovered after {} consecutive failures",
                        shared.name, recovered_from
                    );
                } else {
                    debug!("[{}] poll succeeded", shared.name);
                }
            }
            Err(failure) => {
                let mut failures = 0;
                shared.state.send_modify(|s| {
                    s.phase = PollPhase::Error;
                    s.error = Some(failure.to_string());
                    s.last_failure = Some(failure.clone());
                    s.consecutive_failures += 1;
                    s.last_checked_at = Some(checked_at);
                    failures = s.consecutive_failures;
                });
                warn!(
                    "[{}] poll failed ({}, {} consecutive): {}",
                    shared.name,
                    failure.kind(),
                    failures,
                    failure
                );
                if shared.active.load(Ordering::SeqCst) {
                    Self::schedule_retry(&shared, failures);
                }
            }
        }
    }

    fn schedule_retry(shared: &Arc<Self>, failures: u32) {
        let Some(delay) = shared.options.retry.next_delay(failures) else {
            warn!(
                "[{}] automatic retries exhausted after {} failures; waiting for manual refresh",
                shared.name, failures
            );
            replace_task(&shared.retry_task, None);
            return;
        };

        debug!(
            "[{}] retry {} scheduled in {}ms",
            shared.name,
            failures + 1,
            delay.as_millis()
        );
        let retry = shared.clone();
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            if !retry.active.load(Ordering::SeqCst) {
                return;
            }
            if retry.state.borrow().phase != PollPhase::Error {
                return;
            }
            info!("[{}] auto-retrying (attempt {})", retry.name, failures + 1);
            Self::launch(&retry);
        });
        replace_task(&shared.retry_task, Some(handle));
    }
}

fn lock_task(slot: &Mutex<Option<JoinHandle<()>>>) -> MutexGuard<'_, Option<JoinHandle<()>>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn replace_task(slot: &Mutex<Option<JoinHandle<()>>>, next: Option<JoinHandle<()>>) {
    let previous = std::mem::replace(&mut *lock_task(slot), next);
    if let Some(handle) = previous {
        handle.abort();
    }
}
