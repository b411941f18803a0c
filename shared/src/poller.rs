use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::LocalBoxFuture;
use futures::{pin_mut, select_biased, FutureExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::task::{StatusResponse, TaskState, TaskStatus};

/// Source of task status snapshots, normally the backend's status endpoint.
pub trait StatusClient {
    type Error: Display;

    fn fetch_status(&self, task_id: &str) -> impl Future<Output = Result<StatusResponse, Self::Error>>;
}

/// Suspends the poll loop. Implemented over tokio in native builds and over
/// gloo timers in the browser.
pub trait Timer {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3000,
            timeout_ms: 120_000,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Tracks asynchronous backend jobs until they finish, fail, time out or
/// are cancelled.
#[derive(Clone)]
pub struct TaskPoller<C, T> {
    client: C,
    timer: T,
    config: PollConfig,
}

impl<C, T> TaskPoller<C, T>
where
    C: StatusClient + Clone + 'static,
    T: Timer + Clone + 'static,
{
    pub fn new(client: C, timer: T, config: PollConfig) -> Self {
        Self {
            client,
            timer,
            config,
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Starts tracking `task_id`.
    ///
    /// Nothing is polled until the returned driver future runs; spawn it on
    /// the local executor or await it next to whatever consumes the handle.
    /// The driver resolves to the terminal state.
    pub fn start(&self, task_id: impl Into<String>) -> (PollHandle, LocalBoxFuture<'static, TaskState>) {
        let task_id = task_id.into();
        info!(
            "Tracking task {} every {}ms for up to {}ms",
            task_id, self.config.interval_ms, self.config.timeout_ms
        );

        let (sender, _) = watch::channel(TaskState::new(task_id));
        let state = Arc::new(sender);
        let driver = drive(
            self.client.clone(),
            self.timer.clone(),
            self.config,
            Arc::clone(&state),
        )
        .boxed_local();

        (PollHandle { state }, driver)
    }
}

/// Caller side of a tracked task. Dropping the handle cancels the task.
pub struct PollHandle {
    state: Arc<watch::Sender<TaskState>>,
}

impl PollHandle {
    pub fn task_id(&self) -> String {
        self.state.borrow().task_id.clone()
    }

    pub fn state(&self) -> TaskState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.state.subscribe()
    }

    /// Stops tracking. Returns `false` when the task had already reached a
    /// terminal state, in which case nothing changes.
    pub fn cancel(&self) -> bool {
        let cancelled = self.state.send_if_modified(|state| state.finish(TaskStatus::Cancelled));
        if cancelled {
            info!("Tracking of task {} cancelled", self.task_id());
        }
        cancelled
    }

    pub async fn wait_terminal(&self) -> TaskState {
        let mut updates = self.subscribe();
        match updates.wait_for(|state| state.status.is_terminal()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

// At most one status request is in flight. Cancellation is checked before
// anything else. A tick that lands on the deadline still issues its poll,
// but the deadline then suppresses that poll's result.
async fn drive<C, T>(
    client: C,
    timer: T,
    config: PollConfig,
    state: Arc<watch::Sender<TaskState>>,
) -> TaskState
where
    C: StatusClient,
    T: Timer,
{
    let task_id = state.borrow().task_id.clone();
    let mut observer = state.subscribe();

    let cancelled = async {
        let _ = observer
            .wait_for(|state| state.status == TaskStatus::Cancelled)
            .await;
    }
    .fuse();
    let deadline = timer.sleep(config.timeout()).fuse();
    pin_mut!(cancelled, deadline);

    loop {
        let tick = timer.sleep(config.interval()).fuse();
        pin_mut!(tick);
        select_biased! {
            () = cancelled => return settle(&state, TaskStatus::Cancelled),
            () = tick => {},
            () = deadline => return settle(&state, TaskStatus::TimedOut),
        }

        debug!("Polling status of task {}", task_id);
        let poll = client.fetch_status(&task_id).fuse();
        pin_mut!(poll);
        let response = select_biased! {
            () = cancelled => return settle(&state, TaskStatus::Cancelled),
            () = deadline => return settle(&state, TaskStatus::TimedOut),
            response = poll => response,
        };

        match response {
            Ok(response) => {
                let mut changed_to = None;
                state.send_if_modified(|current| {
                    let changed = current.apply(response);
                    if changed {
                        changed_to = Some((current.status, current.progress));
                    }
                    changed
                });
                if let Some((status, progress)) = changed_to {
                    info!("Task {} is {} ({}%)", task_id, status, progress);
                    if status.is_terminal() {
                        return state.borrow().clone();
                    }
                }
            }
            Err(err) => warn!("Status poll for task {} failed, retrying: {}", task_id, err),
        }
    }
}

fn settle(state: &watch::Sender<TaskState>, status: TaskStatus) -> TaskState {
    if state.send_if_modified(|current| current.finish(status)) {
        warn!("Stopped waiting for task {}: {}", state.borrow().task_id, status);
    }
    state.borrow().clone()
}
