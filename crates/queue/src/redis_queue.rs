//! Redis implementation of the task queue.
//!
//! Key layout, for a queue named `steadydancer`:
//!
//! - `steadydancer`                      — main task list (LPUSH/BRPOPLPUSH)
//! - `steadydancer:processing`          — tasks claimed by a worker
//! - `steadydancer:status:{task_id}`    — serialized [`TaskStatus`]
//! - `steadydancer:revoked:{task_id}`   — revocation marker
//!
//! Status and marker keys expire after [`RESULT_TTL_SECS`]; a task whose
//! status key is gone is "unknown to the queue", which the reconciler
//! turns into `EXPIRED` once the staleness window passes.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::client::{QueueError, TaskQueue};
use crate::messages::{TaskRequest, TaskState, TaskStatus};

/// How long task status and revocation markers are kept (7 days).
pub const RESULT_TTL_SECS: u64 = 604_800;

/// Redis-backed task queue.
///
/// Cheap to clone; the underlying [`ConnectionManager`] handles
/// reconnection automatically.
#[derive(Clone)]
pub struct RedisTaskQueue {
    redis: ConnectionManager,
    queue_name: String,
    processing_queue: String,
}

impl RedisTaskQueue {
    /// Connect to Redis and create a queue handle.
    pub async fn connect(redis_url: &str, queue_name: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| QueueError::ConnectionFailed(e.to_string()))?;
        let redis = ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError::ConnectionFailed(e.to_string()))?;
        Ok(Self::from_connection(redis, queue_name))
    }

    /// Build a queue handle from an existing connection manager.
    pub fn from_connection(redis: ConnectionManager, queue_name: &str) -> Self {
        Self {
            redis,
            queue_name: queue_name.to_string(),
            processing_queue: format!("{queue_name}:processing"),
        }
    }

    fn status_key(&self, task_id: &str) -> String {
        format!("{}:status:{task_id}", self.queue_name)
    }

    fn revoked_key(&self, task_id: &str) -> String {
        format!("{}:revoked:{task_id}", self.queue_name)
    }

    async fn write_status(&self, task_id: &str, status: &TaskStatus) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();
        let serialized = serde_json::to_string(status)?;
        conn.set_ex::<_, _, ()>(self.status_key(task_id), serialized, RESULT_TTL_SECS)
            .await?;
        Ok(())
    }

    // -- Worker-facing half --------------------------------------------

    /// Claim the next task, blocking up to `timeout`.
    ///
    /// BRPOPLPUSH moves the message to the processing list atomically so
    /// a crashing worker does not lose it.
    pub async fn next_task(&self, timeout: Duration) -> Result<Option<TaskRequest>, QueueError> {
        let mut conn = self.redis.clone();
        let timeout_secs = timeout.as_secs().max(1) as usize;

        let raw: Option<String> = redis::cmd("BRPOPLPUSH")
            .arg(&self.queue_name)
            .arg(&self.processing_queue)
            .arg(timeout_secs)
            .query_async(&mut conn)
            .await?;

        match raw {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    /// Drop a claimed task from the processing list once it is done.
    pub async fn ack(&self, request: &TaskRequest) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();
        let serialized = serde_json::to_string(request)?;
        conn.lrem::<_, _, ()>(&self.processing_queue, 1, serialized)
            .await?;
        Ok(())
    }

    /// Record that execution has begun.
    pub async fn mark_started(&self, task_id: &str) -> Result<(), QueueError> {
        self.write_status(
            task_id,
            &TaskStatus {
                state: TaskState::Started,
                result: None,
                error: None,
            },
        )
        .await
    }

    /// Store the worker's final report.
    pub async fn store_result(
        &self,
        task_id: &str,
        state: TaskState,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<(), QueueError> {
        self.write_status(
            task_id,
            &TaskStatus {
                state,
                result,
                error,
            },
        )
        .await
    }

    /// Whether a revoke signal has been sent for this task.
    pub async fn is_revoked(&self, task_id: &str) -> Result<bool, QueueError> {
        let mut conn = self.redis.clone();
        let marker: Option<String> = conn.get(self.revoked_key(task_id)).await?;
        Ok(marker.is_some())
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn enqueue(&self, request: &TaskRequest) -> Result<(), QueueError> {
        // Status first, then the list push: a task visible to a worker
        // always has a status record.
        self.write_status(&request.task_id, &TaskStatus::pending())
            .await?;

        let mut conn = self.redis.clone();
        let serialized = serde_json::to_string(request)?;
        conn.lpush::<_, _, ()>(&self.queue_name, serialized).await?;

        tracing::debug!(
            task_id = %request.task_id,
            task_name = %request.task_name,
            "Task enqueued",
        );
        Ok(())
    }

    async fn status(&self, task_id: &str) -> Result<Option<TaskStatus>, QueueError> {
        let mut conn = self.redis.clone();
        let raw: Option<String> = conn.get(self.status_key(task_id)).await?;
        match raw {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn revoke(&self, task_id: &str) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(self.revoked_key(task_id), "1", RESULT_TTL_SECS)
            .await?;

        // Flip still-pending tasks straight to REVOKED so status queries
        // reflect the revocation without waiting for a worker to see the
        // marker. Started tasks keep their state; the worker's terminal
        // report loses to the caller's own terminal record.
        if let Some(status) = self.status(task_id).await? {
            if status.state == TaskState::Pending {
                self.write_status(
                    task_id,
                    &TaskStatus {
                        state: TaskState::Revoked,
                        result: None,
                        error: None,
                    },
                )
                .await?;
            }
        }

        tracing::debug!(task_id = %task_id, "Revoke signal sent");
        Ok(())
    }
}
