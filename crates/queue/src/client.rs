//! The queue client seam.

use async_trait::async_trait;

use crate::messages::{TaskRequest, TaskStatus};

/// Errors from queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Failed to connect to the queue broker.
    #[error("Queue connection failed: {0}")]
    ConnectionFailed(String),

    /// A broker operation failed.
    #[error("Queue operation failed: {0}")]
    Redis(#[from] redis::RedisError),

    /// Failed to (de)serialize a queue message.
    #[error("Queue message serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Client-side view of the external task queue.
///
/// The orchestration layer treats the queue as an opaque, possibly-delayed,
/// possibly-failing service: it can submit work, ask for a task's current
/// status, and send a best-effort revoke signal. Implemented by
/// [`crate::RedisTaskQueue`] in production and by scripted fakes in tests.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Submit a task. At-most-once per `TaskRequest`.
    async fn enqueue(&self, request: &TaskRequest) -> Result<(), QueueError>;

    /// Current status of a task, or `None` if the queue has no record of
    /// it (never submitted, or the record aged out of the backend).
    async fn status(&self, task_id: &str) -> Result<Option<TaskStatus>, QueueError>;

    /// Best-effort revocation. A task that already started may still run
    /// to completion; callers resolve that race with "first terminal
    /// write wins" on their own records.
    async fn revoke(&self, task_id: &str) -> Result<(), QueueError>;
}
