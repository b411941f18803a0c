use shared::{PollConfig, PollHandle, TaskPoller, TaskState, TaskStatus};
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

use super::stock_results::render_stock_result;
use crate::api::{GlooStatusClient, GlooTimer};

#[derive(Properties, PartialEq)]
pub struct TaskStatusProps {
    pub task_id: String,
    pub poll: PollConfig,
    #[prop_or_default]
    pub on_finish: Callback<TaskState>,
}

/// Tracks one stock-detection task. Unmounting the panel or switching to
/// another task id stops tracking the previous one.
#[function_component(TaskStatusPanel)]
pub fn task_status_panel(props: &TaskStatusProps) -> Html {
    let task = use_state(|| TaskState::new(props.task_id.clone()));
    let handle = use_mut_ref(|| None::<PollHandle>);
    let active = use_mut_ref(String::new);

    {
        let task = task.clone();
        let handle = handle.clone();
        let active = active.clone();
        let on_finish = props.on_finish.clone();

        use_effect_with((props.task_id.clone(), props.poll), move |(task_id, poll)| {
            *active.borrow_mut() = task_id.clone();
            task.set(TaskState::new(task_id.clone()));

            let poller = TaskPoller::new(GlooStatusClient, GlooTimer, *poll);
            let (poll_handle, driver) = poller.start(task_id.clone());
            let mut updates = poll_handle.subscribe();
            *handle.borrow_mut() = Some(poll_handle);

            spawn_local(async move {
                driver.await;
            });

            let current = task_id.clone();
            spawn_local(async move {
                while updates.changed().await.is_ok() {
                    let state = updates.borrow_and_update().clone();
                    // A replaced task only reports its own cancellation.
                    if *active.borrow() != current {
                        break;
                    }
                    let finished = state.status.is_terminal();
                    task.set(state.clone());
                    if finished {
                        on_finish.emit(state);
                        break;
                    }
                }
            });

            move || {
                handle.borrow_mut().take();
            }
        });
    }

    let on_cancel = {
        let handle = handle.clone();
        Callback::from(move |_: MouseEvent| {
            if let Some(handle) = handle.borrow().as_ref() {
                handle.cancel();
            }
        })
    };

    html! {
        <div class="task-status">
            <p><strong>{"Task ID: "}</strong>{ &task.task_id }</p>
            <p><strong>{"Status: "}</strong>{ task.status.to_string() }</p>
            { render_body(&task, on_cancel) }
        </div>
    }
}

fn render_body(task: &TaskState, on_cancel: Callback<MouseEvent>) -> Html {
    match task.status {
        TaskStatus::Queued | TaskStatus::Running => html! {
            <>
                <div class="progress">
                    <div class="progress-fill" style={format!("width: {}%", task.progress)}></div>
                </div>
                <p class="progress-value">{ format!("{}%", task.progress) }</p>
                <button class="clear-btn" onclick={on_cancel}>{"Stop tracking"}</button>
            </>
        },
        TaskStatus::Completed => match &task.result {
            Some(result) => render_stock_result(result),
            None => html! {},
        },
        TaskStatus::Failed => html! {
            <p class="error-message">{ task.error.clone().unwrap_or_else(|| "Unknown error".to_string()) }</p>
        },
        TaskStatus::TimedOut => html! {
            <p class="error-message">{"Stopped waiting for the result. The task may still finish on the server."}</p>
        },
        TaskStatus::Cancelled => html! { <p>{"Tracking stopped."}</p> },
    }
}
