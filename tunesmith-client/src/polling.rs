//! Task status poller
//!
//! Queries a task's status immediately and then on a fixed interval until the
//! upstream reports a terminal state or the query fails. The outcome is handed
//! to a one-shot callback.
//!
//! Session lifecycle: `Idle → Polling → Terminal`, or `Polling → Idle` when
//! stopped. Every session owns a [`CancellationToken`]; `stop` cancels it,
//! which aborts an in-flight request and suppresses the callback. The token is
//! re-checked under the session lock before the terminal transition, so a
//! response arriving after `stop` is never applied.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{GenerationBackend, TaskResult, TaskState, TaskStatusReport};
use crate::tasks::{TaskStatus, TaskUpdate};

/// Interval used in place of a zero interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// Error text for a failed task whose upstream gave no reason
pub const DEFAULT_FAILURE_MESSAGE: &str = "generation failed";

/// Final result of a polling session
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    /// `Success` or `Failed`, never `Pending`
    pub status: TaskStatus,
    pub result: Option<TaskResult>,
    pub error: Option<String>,
}

impl PollOutcome {
    pub fn success(result: Option<TaskResult>) -> Self {
        Self {
            status: TaskStatus::Success,
            result,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Registry update applying this outcome
    pub fn to_update(&self) -> TaskUpdate {
        match self.status {
            TaskStatus::Success => TaskUpdate::succeeded(self.result.clone()),
            _ => TaskUpdate::failed(
                self.error
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            ),
        }
    }
}

/// Poller session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    Terminal,
}

/// Decide what one status report means
///
/// `None` keeps polling; `Some` ends the session with that outcome.
pub fn evaluate(report: &TaskStatusReport) -> Option<PollOutcome> {
    match report.status {
        None => {
            let raw = report
                .raw
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "<empty>".to_string());
            Some(PollOutcome::failed(format!(
                "upstream response is missing a task status: {}",
                raw
            )))
        }
        Some(TaskState::Success) => Some(PollOutcome::success(report.result.clone())),
        Some(TaskState::Failed) => Some(PollOutcome::failed(
            report
                .error
                .clone()
                .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
        )),
        Some(TaskState::Pending) => None,
    }
}

struct Session {
    state: PollState,
    token: CancellationToken,
}

/// Single-session task status poller
///
/// `start` spawns onto the current tokio runtime and must be called from
/// within one.
pub struct Poller {
    backend: Arc<dyn GenerationBackend>,
    interval: Duration,
    session: Arc<Mutex<Session>>,
}

impl Poller {
    /// A zero `interval` is replaced by [`DEFAULT_POLL_INTERVAL`].
    pub fn new(backend: Arc<dyn GenerationBackend>, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!(
                default_ms = DEFAULT_POLL_INTERVAL.as_millis() as u64,
                "Zero poll interval, using default"
            );
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };

        Self {
            backend,
            interval,
            session: Arc::new(Mutex::new(Session {
                state: PollState::Idle,
                token: CancellationToken::new(),
            })),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> PollState {
        lock(&self.session).state
    }

    pub fn is_polling(&self) -> bool {
        self.state() == PollState::Polling
    }

    /// Begin polling `task_id`
    ///
    /// Returns `false` without doing anything if a session is already active.
    /// `on_update` runs at most once, with the terminal outcome.
    pub fn start<F>(&self, task_id: &str, on_update: F) -> bool
    where
        F: FnOnce(PollOutcome) + Send + 'static,
    {
        let token = {
            let mut session = lock(&self.session);
            if session.state == PollState::Polling {
                debug!(task_id, "Poller already active, start ignored");
                return false;
            }
            session.state = PollState::Polling;
            session.token = CancellationToken::new();
            session.token.clone()
        };

        info!(task_id, interval_ms = self.interval.as_millis() as u64, "Polling started");

        tokio::spawn(run_session(
            self.backend.clone(),
            task_id.to_string(),
            self.interval,
            token,
            self.session.clone(),
            on_update,
        ));
        true
    }

    /// Cancel the active session, if any
    ///
    /// Aborts an in-flight query; the callback will not run.
    pub fn stop(&self) {
        let mut session = lock(&self.session);
        if session.state == PollState::Polling {
            session.token.cancel();
            session.state = PollState::Idle;
            debug!("Polling stopped");
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_session<F>(
    backend: Arc<dyn GenerationBackend>,
    task_id: String,
    interval: Duration,
    token: CancellationToken,
    session: Arc<Mutex<Session>>,
    on_update: F,
) where
    F: FnOnce(PollOutcome) + Send + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let outcome = loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            response = backend.task_status(&task_id) => response,
        };

        match response {
            Ok(report) => match evaluate(&report) {
                Some(outcome) => break outcome,
                None => debug!(task_id = %task_id, "Task still pending"),
            },
            Err(e) => {
                warn!(task_id = %task_id, code = e.code(), "Status query failed: {}", e);
                break PollOutcome::failed(e.to_string());
            }
        }
    };

    {
        let mut session = lock(&session);
        if token.is_cancelled() {
            debug!(task_id = %task_id, "Outcome discarded after stop");
            return;
        }
        session.state = PollState::Terminal;
        token.cancel();
    }

    info!(task_id = %task_id, status = %outcome.status, "Polling finished");
    on_update(outcome);
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}
