//! Wire messages exchanged with the task queue.

use serde::{Deserialize, Serialize};

/// Task name for I2V video generation.
pub const TASK_GENERATE_I2V: &str = "steadydancer.generate.i2v";

/// Task name for experiment input preprocessing.
pub const TASK_PREPROCESS_EXPERIMENT: &str = "steadydancer.preprocess.experiment";

/// Execution state of a task as reported by the queue.
///
/// `Pending` covers enqueued-but-unclaimed tasks. A task the queue has no
/// record of at all is represented by the *absence* of a [`TaskStatus`],
/// not by a state value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Started,
    Success,
    Failure,
    Revoked,
}

impl TaskState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Started => "STARTED",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Revoked => "REVOKED",
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Revoked)
    }
}

/// A task submission pushed onto the queue list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_id: String,
    pub task_name: String,
    pub payload: serde_json::Value,
}

impl TaskRequest {
    /// Build a request with a fresh task id.
    pub fn new(task_name: &str, payload: serde_json::Value) -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            task_name: task_name.to_string(),
            payload,
        }
    }
}

/// Current status of a task in the result backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    /// The worker's report, present once the task finished successfully
    /// (and sometimes on failure, when the worker got far enough to
    /// produce one).
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Raw error text from the worker or the queue infrastructure.
    #[serde(default)]
    pub error: Option<String>,
}

impl TaskStatus {
    pub fn pending() -> Self {
        Self {
            state: TaskState::Pending,
            result: None,
            error: None,
        }
    }
}

/// Report produced by the generation worker for `steadydancer.generate.i2v`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub success: bool,
    pub video_path: Option<String>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub return_code: i32,
}

/// Report produced by the preprocess worker for
/// `steadydancer.preprocess.experiment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessReport {
    pub success: bool,
    pub input_dir: Option<String>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub return_code: i32,
}
