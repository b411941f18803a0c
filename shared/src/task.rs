use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

/// Status string reported by the backend's task-status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase", try_from = "String")]
#[strum(ascii_case_insensitive)]
pub enum RemoteStatus {
    #[strum(to_string = "queued", serialize = "pending")]
    Queued,
    #[strum(to_string = "running", serialize = "processing")]
    Running,
    #[strum(to_string = "completed")]
    Completed,
    #[strum(to_string = "failed")]
    Failed,
}

impl TryFrom<String> for RemoteStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.trim().parse()
    }
}

/// Local view of a tracked task. `TimedOut` and `Cancelled` never come
/// from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Queued,
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::TimedOut | TaskStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(default, deserialize_with = "item_counts")]
    pub results: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl TaskResult {
    /// Appends a `t=<millis>` query parameter so a freshly rendered video is
    /// not served from the browser cache.
    pub fn video_url_with_cache_buster(&self, millis: i64) -> Option<String> {
        self.video_url.as_ref().map(|url| {
            let separator = if url.contains('?') { '&' } else { '?' };
            format!("{url}{separator}t={millis}")
        })
    }
}

// Counts arrive as JSON numbers, occasionally as floats. Entries that are
// not numbers are dropped rather than failing the whole status payload.
fn item_counts<'de, D>(deserializer: D) -> Result<BTreeMap<String, u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(item, count)| {
            let count = count
                .as_u64()
                .or_else(|| count.as_f64().filter(|c| *c >= 0.0).map(|c| c.round() as u64))?;
            Some((item, count))
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: RemoteStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub result: Option<TaskResult>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub elapsed_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskState {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Queued,
            progress: 0,
            result: None,
            error: None,
        }
    }

    /// A task whose submission already carried the finished result.
    pub fn completed(task_id: impl Into<String>, result: TaskResult) -> Self {
        Self {
            status: TaskStatus::Completed,
            progress: 100,
            result: Some(result),
            ..Self::new(task_id)
        }
    }

    /// Folds one status poll into the state. Returns whether anything changed.
    /// Terminal states are never left.
    pub fn apply(&mut self, response: StatusResponse) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        let before = self.clone();

        if let Some(progress) = response.progress.filter(|p| p.is_finite()) {
            self.progress = progress.clamp(0.0, 100.0).round() as u8;
        }

        match response.status {
            RemoteStatus::Queued => {}
            RemoteStatus::Running => self.status = TaskStatus::Running,
            RemoteStatus::Completed => match response.result {
                Some(result) => {
                    self.status = TaskStatus::Completed;
                    self.result = Some(result);
                }
                // Completion is only final once the result is attached.
                None => self.status = TaskStatus::Running,
            },
            RemoteStatus::Failed => {
                self.status = TaskStatus::Failed;
                self.error = Some(response.error.unwrap_or_else(|| "Unknown error".to_string()));
            }
        }

        *self != before
    }

    /// Moves a non-terminal state into a local terminal state.
    pub fn finish(&mut self, status: TaskStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub results: Option<Value>,
    #[serde(default)]
    pub video_url: Option<String>,
}

/// What a video upload turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Pending { task_id: String },
    Ready(TaskResult),
}

impl SubmissionResponse {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }

    /// `None` when the backend did not accept the upload.
    pub fn into_submission(self) -> Option<Submission> {
        if !self.is_success() {
            return None;
        }
        if let Some(task_id) = self.task_id.filter(|id| !id.is_empty()) {
            return Some(Submission::Pending { task_id });
        }
        let mut payload = serde_json::Map::new();
        payload.insert("results".into(), self.results.unwrap_or(Value::Null));
        if let Some(video_url) = self.video_url {
            payload.insert("video_url".into(), Value::String(video_url));
        }
        let result = serde_json::from_value(Value::Object(payload)).unwrap_or_default();
        Some(Submission::Ready(result))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResponse {
    pub status: String,
    #[serde(default)]
    pub classification: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(value: Value) -> StatusResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn remote_status_accepts_backend_aliases() {
        assert_eq!(status(json!({"status": "processing"})).status, RemoteStatus::Running);
        assert_eq!(status(json!({"status": "Pending"})).status, RemoteStatus::Queued);
        assert_eq!(status(json!({"status": "COMPLETED"})).status, RemoteStatus::Completed);
        assert!(serde_json::from_value::<StatusResponse>(json!({"status": "exploded"})).is_err());
        assert_eq!(RemoteStatus::Running.to_string(), "running");
    }

    #[test]
    fn progress_is_clamped_and_rounded() {
        let mut state = TaskState::new("t");
        assert!(state.apply(status(json!({"status": "running", "progress": 140.0}))));
        assert_eq!(state.progress, 100);
        state.apply(status(json!({"status": "running", "progress": -3})));
        assert_eq!(state.progress, 0);
        state.apply(status(json!({"status": "running", "progress": 41.6})));
        assert_eq!(state.progress, 42);
        assert!(!state.apply(status(json!({"status": "running"}))));
        assert_eq!(state.progress, 42);
    }

    #[test]
    fn completion_waits_for_result() {
        let mut state = TaskState::new("t");
        state.apply(status(json!({"status": "completed", "progress": 100})));
        assert_eq!(state.status, TaskStatus::Running);

        state.apply(status(json!({
            "status": "completed",
            "progress": 100,
            "result": {"results": {"apple": 3, "milk": 1.0, "note": "n/a"}, "video_url": "/static/out.mp4"}
        })));
        assert_eq!(state.status, TaskStatus::Completed);
        let result = state.result.as_ref().unwrap();
        assert_eq!(result.results.get("apple"), Some(&3));
        assert_eq!(result.results.get("milk"), Some(&1));
        assert!(!result.results.contains_key("note"));
    }

    #[test]
    fn terminal_states_are_sticky() {
        let mut state = TaskState::new("t");
        state.apply(status(json!({"status": "failed", "error": "decoder crashed"})));
        assert_eq!(state.status, TaskStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("decoder crashed"));
        assert!(!state.apply(status(json!({"status": "running", "progress": 10}))));
        assert!(!state.finish(TaskStatus::TimedOut));
        assert_eq!(state.status, TaskStatus::Failed);
    }

    #[test]
    fn failure_without_message_gets_placeholder() {
        let mut state = TaskState::new("t");
        state.apply(status(json!({"status": "failed"})));
        assert_eq!(state.error.as_deref(), Some("Unknown error"));
    }

    #[test]
    fn submission_with_task_id_is_pending() {
        let response: SubmissionResponse = serde_json::from_value(json!({
            "status": "success",
            "message": "Video uploaded and processing started",
            "task_id": "abc"
        }))
        .unwrap();
        assert_eq!(
            response.into_submission(),
            Some(Submission::Pending { task_id: "abc".into() })
        );
    }

    #[test]
    fn synchronous_submission_is_ready() {
        let response: SubmissionResponse = serde_json::from_value(json!({
            "status": "success",
            "results": {"eggs": 12},
            "video_url": "/static/out.mp4"
        }))
        .unwrap();
        match response.into_submission() {
            Some(Submission::Ready(result)) => {
                assert_eq!(result.results.get("eggs"), Some(&12));
                assert_eq!(
                    result.video_url_with_cache_buster(42).as_deref(),
                    Some("/static/out.mp4?t=42")
                );
            }
            other => panic!("unexpected submission: {other:?}"),
        }

        let rejected = SubmissionResponse {
            status: "error".into(),
            message: None,
            task_id: Some("abc".into()),
            results: None,
            video_url: None,
        };
        assert_eq!(rejected.into_submission(), None);
    }

    #[test]
    fn cache_buster_appends_to_existing_query() {
        let result = TaskResult {
            video_url: Some("/static/out.mp4?v=2".into()),
            ..TaskResult::default()
        };
        assert_eq!(
            result.video_url_with_cache_buster(7).as_deref(),
            Some("/static/out.mp4?v=2&t=7")
        );
        assert_eq!(TaskResult::default().video_url_with_cache_buster(7), None);
    }

    #[test]
    fn local_status_display_is_snake_case() {
        assert_eq!(TaskStatus::TimedOut.to_string(), "timed_out");
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }
}
