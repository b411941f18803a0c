use std::future::Future;
use std::time::Duration;

use futures::future::{self, Either};
use futures::pin_mut;
use shared::{PollConfig, StatusClient, Submission, TaskPoller, TaskState, Timer};

/// Task id reported for results the backend returned with the upload itself.
pub const INLINE_TASK_ID: &str = "inline";

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        tokio::time::sleep(duration)
    }
}

/// Follows a stock-detection submission to its terminal state, reporting
/// every observed state change to `on_update`.
///
/// Resolving `cancel_on` stops tracking; the returned state is then
/// `Cancelled` unless the task had already finished.
pub async fn track_submission<C, T, F, S>(
    client: C,
    timer: T,
    submission: Submission,
    config: PollConfig,
    mut on_update: F,
    cancel_on: S,
) -> TaskState
where
    C: StatusClient + Clone + 'static,
    T: Timer + Clone + 'static,
    F: FnMut(&TaskState),
    S: Future<Output = ()>,
{
    let task_id = match submission {
        Submission::Ready(result) => {
            let state = TaskState::completed(INLINE_TASK_ID, result);
            on_update(&state);
            return state;
        }
        Submission::Pending { task_id } => task_id,
    };

    let poller = TaskPoller::new(client, timer, config);
    let (handle, driver) = poller.start(task_id);
    let mut updates = handle.subscribe();

    let report = async move {
        let state = updates.borrow_and_update().clone();
        on_update(&state);
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            on_update(&state);
            if state.status.is_terminal() {
                break;
            }
        }
    };
    let work = async { futures::join!(driver, report).0 };
    let cancel = async {
        cancel_on.await;
        handle.cancel();
    };
    pin_mut!(work, cancel);

    match future::select(work, cancel).await {
        Either::Left((state, _)) => state,
        Either::Right(((), work)) => work.await,
    }
}
