use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::event_log::{EventLevel, EventLog, EventSource};
use crate::poll::{PollPhase, PollSnapshot, RetryPolicy};
use crate::state::SharedState;

/// Event to record for a snapshot change, if any. Only phase changes and
/// repeated failures are interesting; `Loading` flips are noise.
pub fn describe_transition<T>(
    label: &str,
    previous: &PollSnapshot<T>,
    current: &PollSnapshot<T>,
    retry: &RetryPolicy,
) -> Option<(EventLevel, String)> {
    match current.phase {
        PollPhase::Ready if previous.consecutive_failures > 0 => Some((
            EventLevel::Info,
            format!(
                "{} recovered after {} failed attempts",
                label, previous.consecutive_failures
            ),
        )),
        PollPhase::Ready if previous.last_success_at.is_none() => {
            Some((EventLevel::Info, format!("{} loaded", label)))
        }
        PollPhase::Error if current.consecutive_failures != previous.consecutive_failures => {
            let reason = current.error.as_deref().unwrap_or("unknown error");
            if retry.exhausted(current.consecutive_failures) {
                Some((
                    EventLevel::Error,
                    format!(
                        "{} failed {} times ({}); automatic retries stopped, refresh manually",
                        label, current.consecutive_failures, reason
                    ),
                ))
            } else {
                Some((
                    EventLevel::Warn,
                    format!(
                        "{} failed ({}), attempt {}",
                        label, reason, current.consecutive_failures
                    ),
                ))
            }
        }
        _ => None,
    }
}

/// Mirror a controller's state changes into the event log until the
/// controller is dropped.
pub fn spawn_phase_monitor<T>(
    state: SharedState,
    source: EventSource,
    label: String,
    mut rx: watch::Receiver<PollSnapshot<T>>,
    retry: RetryPolicy,
) -> tokio::task::JoinHandle<()>
where
    T: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut previous = rx.borrow_and_update().clone();
        while rx.changed().await.is_ok() {
            let current = rx.borrow_and_update().clone();
            if let Some((level, message)) =
                describe_transition(&label, &previous, &current, &retry)
            {
                match level {
                    EventLevel::Error => error!("{}", message),
                    EventLevel::Warn => warn!("{}", message),
                    EventLevel::Info => info!("{}", message),
                    EventLevel::Debug => debug!("{}", message),
                }
                state.events.emit(source, level, message).await;
            }
            previous = current;
        }
        debug!("{} monitor finished", label);
    })
}
