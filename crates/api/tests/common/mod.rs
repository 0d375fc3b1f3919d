//! Shared harness for API integration tests.
//!
//! Builds the production router against a scripted fake queue and temp
//! filesystem roots, so every branch of the queue-state mapping can be
//! driven deterministically.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tempfile::TempDir;
use tower::ServiceExt;

use steadydancer_api::config::ServerConfig;
use steadydancer_api::router::build_app_router;
use steadydancer_api::state::AppState;
use steadydancer_queue::{QueueError, TaskQueue, TaskRequest, TaskState, TaskStatus};

/// Scripted in-memory queue.
///
/// Enqueued tasks default to PENDING; tests override per-task status to
/// drive the reconciler. `None` scripts "unknown to the queue".
#[derive(Default)]
pub struct FakeQueue {
    pub enqueued: Mutex<Vec<TaskRequest>>,
    pub revoked: Mutex<Vec<String>>,
    scripted: Mutex<HashMap<String, Option<TaskStatus>>>,
}

impl FakeQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_status(&self, task_id: &str, status: Option<TaskStatus>) {
        self.scripted
            .lock()
            .unwrap()
            .insert(task_id.to_string(), status);
    }

    pub fn script_state(&self, task_id: &str, state: TaskState) {
        self.set_status(
            task_id,
            Some(TaskStatus {
                state,
                result: None,
                error: None,
            }),
        );
    }

    pub fn script_success(&self, task_id: &str, result: serde_json::Value) {
        self.set_status(
            task_id,
            Some(TaskStatus {
                state: TaskState::Success,
                result: Some(result),
                error: None,
            }),
        );
    }

    pub fn script_failure(&self, task_id: &str, error: &str) {
        self.set_status(
            task_id,
            Some(TaskStatus {
                state: TaskState::Failure,
                result: None,
                error: Some(error.to_string()),
            }),
        );
    }

    /// Make the queue forget the task entirely.
    pub fn script_unknown(&self, task_id: &str) {
        self.set_status(task_id, None);
    }

    pub fn last_task(&self) -> TaskRequest {
        self.enqueued
            .lock()
            .unwrap()
            .last()
            .expect("no task enqueued")
            .clone()
    }

    pub fn enqueued_count(&self) -> usize {
        self.enqueued.lock().unwrap().len()
    }

    fn effective_status(&self, task_id: &str) -> Option<TaskStatus> {
        if let Some(scripted) = self.scripted.lock().unwrap().get(task_id) {
            return scripted.clone();
        }
        let known = self
            .enqueued
            .lock()
            .unwrap()
            .iter()
            .any(|t| t.task_id == task_id);
        known.then(TaskStatus::pending)
    }
}

#[async_trait]
impl TaskQueue for FakeQueue {
    async fn enqueue(&self, request: &TaskRequest) -> Result<(), QueueError> {
        self.enqueued.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn status(&self, task_id: &str) -> Result<Option<TaskStatus>, QueueError> {
        Ok(self.effective_status(task_id))
    }

    async fn revoke(&self, task_id: &str) -> Result<(), QueueError> {
        self.revoked.lock().unwrap().push(task_id.to_string());
        // Mirror the production queue: a still-pending task flips to
        // REVOKED; a started task keeps running.
        if let Some(status) = self.effective_status(task_id) {
            if status.state == TaskState::Pending {
                self.script_state(task_id, TaskState::Revoked);
            }
        }
        Ok(())
    }
}

/// A running test application plus the handles tests poke at.
pub struct TestApp {
    pub app: Router,
    pub queue: Arc<FakeQueue>,
    /// Data root; all project/job directories land underneath.
    pub data_root: TempDir,
    /// Repository root; relative path inputs resolve against this.
    pub repo_root: TempDir,
}

pub fn test_config(data_root: &TempDir, repo_root: &TempDir) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        data_root: data_root.path().to_path_buf(),
        repo_root: repo_root.path().to_path_buf(),
        models_dir: repo_root.path().join("models"),
        queue_url: "redis://unused-in-tests".to_string(),
        queue_name: "steadydancer".to_string(),
        api_key: None,
        task_staleness_secs: 3600,
    }
}

pub fn build_test_app(pool: PgPool) -> TestApp {
    build_test_app_with(pool, |_| {})
}

/// Build the app with a config tweak (API key, staleness window, ...).
pub fn build_test_app_with(pool: PgPool, tweak: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let data_root = TempDir::new().unwrap();
    let repo_root = TempDir::new().unwrap();
    let mut config = test_config(&data_root, &repo_root);
    tweak(&mut config);

    let queue = FakeQueue::new();
    let state = AppState::new(pool, config.clone(), queue.clone());
    let app = build_app_router(state, &config);

    TestApp {
        app,
        queue,
        data_root,
        repo_root,
    }
}

/// Send a request and return status + parsed JSON body (Null when empty).
pub async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            builder.body(Body::from(value.to_string())).unwrap()
        }
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send_json(app, Method::GET, uri, None).await
}

pub async fn post(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send_json(app, Method::POST, uri, Some(body)).await
}
