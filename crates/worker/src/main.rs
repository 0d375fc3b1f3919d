//! Queue consumer for SteadyDancer tasks.
//!
//! The generative model lives in an external, separately-versioned CLI;
//! this binary is only the queue-protocol shim around it. It claims
//! tasks, honors revocation, invokes the CLI as a subprocess, and stores
//! the worker report in the result backend keyed by task id.

mod adapter;

use std::path::PathBuf;
use std::time::Duration;

use steadydancer_queue::messages::{
    TaskRequest, TaskState, TASK_GENERATE_I2V, TASK_PREPROCESS_EXPERIMENT,
};
use steadydancer_queue::RedisTaskQueue;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub queue_url: String,
    pub queue_name: String,
    /// The external SteadyDancer CLI executable.
    pub cli_command: String,
    /// Models root, forwarded to the CLI via `MODELS_DIR`.
    pub models_dir: PathBuf,
    pub poll_timeout_secs: u64,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let queue_url = std::env::var("JOB_QUEUE_URL")
            .unwrap_or_else(|_| "redis://localhost:6379/1".into());
        let queue_name = std::env::var("QUEUE_NAME").unwrap_or_else(|_| "steadydancer".into());
        let cli_command =
            std::env::var("STEADYDANCER_CLI").unwrap_or_else(|_| "steadydancer-cli".into());
        let models_dir = std::env::var("MODELS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("models"));
        let poll_timeout_secs: u64 = std::env::var("WORKER_POLL_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("WORKER_POLL_TIMEOUT_SECS must be a valid u64");

        Self {
            queue_url,
            queue_name,
            cli_command,
            models_dir,
            poll_timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "steadydancer_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    let queue = RedisTaskQueue::connect(&config.queue_url, &config.queue_name)
        .await
        .expect("Failed to connect to task queue");

    tracing::info!(
        queue = %config.queue_name,
        cli = %config.cli_command,
        models_dir = %config.models_dir.display(),
        "Worker started",
    );

    loop {
        match queue
            .next_task(Duration::from_secs(config.poll_timeout_secs))
            .await
        {
            Ok(Some(task)) => handle_task(&queue, &config, task).await,
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "Failed to poll queue");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

async fn handle_task(queue: &RedisTaskQueue, config: &WorkerConfig, task: TaskRequest) {
    let task_id = task.task_id.clone();

    // A revoke signal that arrived while the task sat in the queue wins;
    // execution never starts.
    match queue.is_revoked(&task_id).await {
        Ok(true) => {
            tracing::info!(task_id = %task_id, "Task revoked before execution");
            let _ = queue
                .store_result(&task_id, TaskState::Revoked, None, None)
                .await;
            let _ = queue.ack(&task).await;
            return;
        }
        Ok(false) => {}
        Err(e) => tracing::warn!(task_id = %task_id, error = %e, "Revocation check failed"),
    }

    if let Err(e) = queue.mark_started(&task_id).await {
        tracing::warn!(task_id = %task_id, error = %e, "Failed to mark task started");
    }

    tracing::info!(task_id = %task_id, task_name = %task.task_name, "Task started");

    let outcome = match task.task_name.as_str() {
        TASK_GENERATE_I2V => adapter::run_generation(config, &task.payload).await,
        TASK_PREPROCESS_EXPERIMENT => adapter::run_preprocess(config, &task.payload).await,
        other => Err(anyhow::anyhow!("unknown task name: {other}")),
    };

    let store = match outcome {
        Ok(report) => {
            let state = if report["success"].as_bool().unwrap_or(false) {
                TaskState::Success
            } else {
                TaskState::Failure
            };
            queue
                .store_result(&task_id, state, Some(report), None)
                .await
        }
        Err(e) => {
            tracing::error!(task_id = %task_id, error = %e, "Task execution failed");
            queue
                .store_result(&task_id, TaskState::Failure, None, Some(e.to_string()))
                .await
        }
    };
    if let Err(e) = store {
        tracing::error!(task_id = %task_id, error = %e, "Failed to store task result");
    }

    if let Err(e) = queue.ack(&task).await {
        tracing::warn!(task_id = %task_id, error = %e, "Failed to ack task");
    }

    tracing::info!(task_id = %task_id, "Task finished");
}
