use crate::client::types::{Task, TaskStatus};
use crate::client::TaskStatusSource;
use crate::error::ClientResult;
use crate::manager::mapper;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, Notify};
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

/// Identifies one polling session; a new one is issued by every `start`
pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
    Completed,
    Failed,
}

/// Receives every snapshot the poller applies
pub trait SnapshotSink: Send + Sync {
    fn on_snapshot(&self, snapshot: &Task);
}

struct Session {
    id: SessionId,
    task_id: String,
    stop: Arc<Notify>,
}

struct PollState {
    state: PollerState,
    last_session: SessionId,
    active: Option<Session>,
    last_snapshot: Option<Task>,
}

struct Shared {
    source: Arc<dyn TaskStatusSource>,
    sink: Arc<dyn SnapshotSink>,
    state: Mutex<PollState>,
}

/// Shortest tick period; `interval_at` rejects a zero period
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Polls one server task at a time until it completes, fails or is stopped
pub struct TaskPoller {
    shared: Arc<Shared>,
    interval: Duration,
}

impl TaskPoller {
    pub fn new(
        source: Arc<dyn TaskStatusSource>,
        sink: Arc<dyn SnapshotSink>,
        interval: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                sink,
                state: Mutex::new(PollState {
                    state: PollerState::Idle,
                    last_session: 0,
                    active: None,
                    last_snapshot: None,
                }),
            }),
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// Begin polling `task_id`, superseding any active session.
    /// The first check runs one interval after the call.
    pub async fn start(&self, task_id: impl Into<String>) -> SessionId {
        let task_id = task_id.into();
        let stop = Arc::new(Notify::new());

        let session = {
            let mut guard = self.shared.state.lock().await;
            if let Some(previous) = guard.active.take() {
                previous.stop.notify_one();
                tracing::info!(task_id = %previous.task_id, session = previous.id, "polling session superseded");
            }
            guard.last_session += 1;
            let id = guard.last_session;
            guard.active = Some(Session {
                id,
                task_id: task_id.clone(),
                stop: stop.clone(),
            });
            guard.state = PollerState::Polling;
            guard.last_snapshot = None;
            id
        };

        tracing::info!(task_id = %task_id, session, interval = ?self.interval, "polling started");
        tokio::spawn(Self::run(
            Arc::downgrade(&self.shared),
            session,
            task_id,
            stop,
            self.interval,
        ));
        session
    }

    async fn run(
        shared: Weak<Shared>,
        session: SessionId,
        task_id: String,
        stop: Arc<Notify>,
        period: Duration,
    ) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stop.notified() => break,
                _ = ticker.tick() => {
                    let Some(shared) = shared.upgrade() else { break };
                    if !shared.check(session, &task_id).await {
                        break;
                    }
                }
            }
        }
        tracing::debug!(task_id = %task_id, session, "polling loop exited");
    }

    /// Check the active task once, right now. Returns `false` when idle.
    pub async fn refresh(&self) -> bool {
        let (session, task_id) = {
            let guard = self.shared.state.lock().await;
            match &guard.active {
                Some(active) if guard.state == PollerState::Polling => {
                    (active.id, active.task_id.clone())
                }
                _ => return false,
            }
        };
        self.shared.check(session, &task_id).await;
        true
    }

    /// Stop polling and forget the task. Safe to call at any time; returns
    /// whether a session was actually stopped.
    pub async fn stop(&self) -> bool {
        let mut guard = self.shared.state.lock().await;
        match guard.active.take() {
            Some(session) => {
                session.stop.notify_one();
                guard.state = PollerState::Idle;
                tracing::info!(task_id = %session.task_id, session = session.id, "polling stopped");
                true
            }
            None => false,
        }
    }

    pub async fn state(&self) -> PollerState {
        self.shared.state.lock().await.state
    }

    pub async fn task_id(&self) -> Option<String> {
        let guard = self.shared.state.lock().await;
        guard.active.as_ref().map(|s| s.task_id.clone())
    }

    pub async fn session(&self) -> Option<SessionId> {
        let guard = self.shared.state.lock().await;
        guard.active.as_ref().map(|s| s.id)
    }

    pub async fn last_snapshot(&self) -> Option<Task> {
        self.shared.state.lock().await.last_snapshot.clone()
    }
}

impl Drop for TaskPoller {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.shared.state.try_lock() {
            if let Some(session) = guard.active.take() {
                session.stop.notify_one();
            }
        }
    }
}

impl Shared {
    async fn is_current(&self, session: SessionId) -> bool {
        let guard = self.state.lock().await;
        guard.state == PollerState::Polling
            && guard.active.as_ref().map(|s| s.id) == Some(session)
    }

    /// One status round trip. Returns whether the session keeps polling.
    async fn check(&self, session: SessionId, task_id: &str) -> bool {
        if !self.is_current(session).await {
            return false;
        }
        tracing::debug!(task_id, session, "checking task status");
        let response = self.source.fetch_status(task_id).await;
        self.apply(session, task_id, response).await
    }

    async fn apply(&self, session: SessionId, task_id: &str, response: ClientResult<Value>) -> bool {
        let snapshot = match response.and_then(|payload| mapper::map_status_payload(task_id, payload)) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(task_id, session, error = %e, "status check failed, tick skipped");
                return self.is_current(session).await;
            }
        };

        let mut guard = self.state.lock().await;
        let current = guard.state == PollerState::Polling
            && guard.active.as_ref().map(|s| s.id) == Some(session);
        if !current {
            tracing::debug!(task_id, session, "discarding stale status response");
            return false;
        }

        // Emitted under the lock so a racing check cannot interleave
        self.sink.on_snapshot(&snapshot);
        let status = snapshot.status;
        guard.last_snapshot = Some(snapshot);

        let terminal = match status {
            TaskStatus::Completed => PollerState::Completed,
            TaskStatus::Failed => PollerState::Failed,
            TaskStatus::Pending | TaskStatus::Processing => return true,
        };
        guard.state = terminal;
        if let Some(active) = guard.active.take() {
            active.stop.notify_one();
        }
        tracing::info!(task_id, session, state = ?terminal, "task reached terminal state");
        false
    }
}
