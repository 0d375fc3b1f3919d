//! Preprocess-driven experiment creation: async input_dir population,
//! the single-task-in-flight rule, and retry after failure.

mod common;

use axum::http::StatusCode;
use common::{build_test_app, get, post, TestApp};
use serde_json::json;
use sqlx::PgPool;
use steadydancer_queue::TaskState;

/// Create a project with one reference and one motion asset.
async fn seed_assets(t: &TestApp) -> (String, String, String) {
    let (_, project) = post(&t.app, "/projects", json!({"name": "Preprocess"})).await;
    let project_id = project["id"].as_str().unwrap().to_string();

    std::fs::write(t.repo_root.path().join("face.png"), b"png").unwrap();
    std::fs::write(t.repo_root.path().join("dance.mp4"), b"mp4").unwrap();

    let (status, reference) = post(
        &t.app,
        &format!("/projects/{project_id}/refs"),
        json!({"name": "face", "source_image_path": "face.png", "meta": {"character": "A"}}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, motion) = post(
        &t.app,
        &format!("/projects/{project_id}/motions"),
        json!({"name": "dance", "source_video_path": "dance.mp4"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    (
        project_id,
        reference["id"].as_str().unwrap().to_string(),
        motion["id"].as_str().unwrap().to_string(),
    )
}

fn experiment_uri(project_id: &str, experiment_id: &str) -> String {
    format!("/projects/{project_id}/experiments/{experiment_id}")
}

#[sqlx::test(migrations = "../db/migrations")]
async fn direct_experiment_has_input_dir_immediately(pool: PgPool) {
    let t = build_test_app(pool);
    let (project_id, reference_id, motion_id) = seed_assets(&t).await;

    let pair_dir = t.repo_root.path().join("pair");
    std::fs::create_dir_all(&pair_dir).unwrap();
    std::fs::write(pair_dir.join("ref_image.png"), b"png").unwrap();

    let (status, experiment) = post(
        &t.app,
        &format!("/projects/{project_id}/experiments"),
        json!({
            "name": "direct",
            "reference_id": reference_id,
            "motion_id": motion_id,
            "source_input_dir": "pair",
            "config": {"frame_num": 49}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let input_dir = experiment["input_dir"].as_str().unwrap();
    assert!(input_dir.ends_with("/input"));
    assert!(std::path::Path::new(input_dir).join("ref_image.png").is_file());
    // The config snapshot sits next to the input directory.
    assert!(std::path::Path::new(input_dir)
        .parent()
        .unwrap()
        .join("config.json")
        .is_file());
    // No preprocess task involved.
    assert!(experiment["preprocess_task_id"].is_null());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn direct_experiment_with_missing_source_dir_writes_nothing(pool: PgPool) {
    let t = build_test_app(pool);
    let (project_id, _, _) = seed_assets(&t).await;

    let (status, body) = post(
        &t.app,
        &format!("/projects/{project_id}/experiments"),
        json!({"name": "ghost", "source_input_dir": "no/such/dir"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (_, listed) = get(&t.app, &format!("/projects/{project_id}/experiments")).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn preprocess_fills_input_dir_on_success(pool: PgPool) {
    let t = build_test_app(pool);
    let (project_id, reference_id, motion_id) = seed_assets(&t).await;

    let (status, dispatched) = post(
        &t.app,
        &format!("/projects/{project_id}/experiments/preprocess"),
        json!({
            "name": "async-pair",
            "reference_id": reference_id,
            "motion_id": motion_id,
            "config": {"prompt_override": "stage lights"}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let experiment_id = dispatched["experiment_id"].as_str().unwrap().to_string();
    let task_id = dispatched["task_id"].as_str().unwrap().to_string();

    // The preprocess payload carries both asset paths and the target dir.
    let task = t.queue.last_task();
    assert_eq!(task.task_id, task_id);
    assert!(task.payload["reference_image_path"]
        .as_str()
        .unwrap()
        .ends_with("source/face.png"));
    assert!(task.payload["motion_video_path"]
        .as_str()
        .unwrap()
        .ends_with("source/dance.mp4"));
    assert_eq!(task.payload["prompt"], "stage lights");

    // Until the task finishes, input_dir stays null.
    let (_, experiment) = get(&t.app, &experiment_uri(&project_id, &experiment_id)).await;
    assert!(experiment["input_dir"].is_null());

    // Worker succeeds; the next read folds the result in.
    let target = task.payload["target_input_dir"].as_str().unwrap().to_string();
    t.queue.script_success(
        &task_id,
        json!({"success": true, "input_dir": target, "stdout": "", "stderr": "", "return_code": 0}),
    );

    let (_, experiment) = get(&t.app, &experiment_uri(&project_id, &experiment_id)).await;
    let input_dir = experiment["input_dir"].as_str().unwrap().to_string();
    assert!(input_dir.ends_with("/input"));

    // Idempotent: a second read leaves the canonical dir untouched.
    let (_, again) = get(&t.app, &experiment_uri(&project_id, &experiment_id)).await;
    assert_eq!(again["input_dir"].as_str().unwrap(), input_dir);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn second_preprocess_while_in_flight_is_conflict(pool: PgPool) {
    let t = build_test_app(pool);
    let (project_id, reference_id, motion_id) = seed_assets(&t).await;

    let (_, dispatched) = post(
        &t.app,
        &format!("/projects/{project_id}/experiments/preprocess"),
        json!({"name": "busy", "reference_id": reference_id, "motion_id": motion_id}),
    )
    .await;
    let experiment_id = dispatched["experiment_id"].as_str().unwrap().to_string();

    // The first task is still pending: a second request is rejected, not
    // silently superseded.
    let (status, body) = post(
        &t.app,
        &format!("{}/preprocess", experiment_uri(&project_id, &experiment_id)),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
    assert_eq!(t.queue.enqueued_count(), 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn failed_preprocess_records_error_and_allows_retry(pool: PgPool) {
    let t = build_test_app(pool);
    let (project_id, reference_id, motion_id) = seed_assets(&t).await;

    let (_, dispatched) = post(
        &t.app,
        &format!("/projects/{project_id}/experiments/preprocess"),
        json!({"name": "flaky", "reference_id": reference_id, "motion_id": motion_id}),
    )
    .await;
    let experiment_id = dispatched["experiment_id"].as_str().unwrap().to_string();
    let task_id = dispatched["task_id"].as_str().unwrap().to_string();

    t.queue.script_failure(&task_id, "pose detection failed");
    let (_, experiment) = get(&t.app, &experiment_uri(&project_id, &experiment_id)).await;
    assert!(experiment["input_dir"].is_null());
    assert_eq!(experiment["preprocess_error"], "pose detection failed");

    // Retry dispatches a fresh task and clears the recorded error.
    let (status, retried) = post(
        &t.app,
        &format!("{}/preprocess", experiment_uri(&project_id, &experiment_id)),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let retry_task_id = retried["task_id"].as_str().unwrap().to_string();
    assert_ne!(retry_task_id, task_id);
    assert_eq!(t.queue.enqueued_count(), 2);

    let (_, experiment) = get(&t.app, &experiment_uri(&project_id, &experiment_id)).await;
    assert!(experiment["preprocess_error"].is_null());

    // This attempt succeeds.
    let target = t.queue.last_task().payload["target_input_dir"]
        .as_str()
        .unwrap()
        .to_string();
    t.queue.script_success(
        &retry_task_id,
        json!({"success": true, "input_dir": target, "stdout": "", "stderr": "", "return_code": 0}),
    );
    let (_, experiment) = get(&t.app, &experiment_uri(&project_id, &experiment_id)).await;
    assert!(experiment["input_dir"].as_str().unwrap().ends_with("/input"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn revoked_preprocess_counts_as_failed(pool: PgPool) {
    let t = build_test_app(pool);
    let (project_id, reference_id, motion_id) = seed_assets(&t).await;

    let (_, dispatched) = post(
        &t.app,
        &format!("/projects/{project_id}/experiments/preprocess"),
        json!({"name": "revoked", "reference_id": reference_id, "motion_id": motion_id}),
    )
    .await;
    let experiment_id = dispatched["experiment_id"].as_str().unwrap().to_string();
    let task_id = dispatched["task_id"].as_str().unwrap().to_string();

    t.queue.script_state(&task_id, TaskState::Revoked);

    let (_, experiment) = get(&t.app, &experiment_uri(&project_id, &experiment_id)).await;
    assert!(experiment["input_dir"].is_null());
    assert!(!experiment["preprocess_error"].is_null());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn preprocess_with_unknown_asset_is_rejected_without_side_effects(pool: PgPool) {
    let t = build_test_app(pool);
    let (project_id, reference_id, _) = seed_assets(&t).await;

    let (status, body) = post(
        &t.app,
        &format!("/projects/{project_id}/experiments/preprocess"),
        json!({
            "name": "dangling",
            "reference_id": reference_id,
            "motion_id": uuid::Uuid::new_v4()
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(t.queue.enqueued_count(), 0);

    let (_, listed) = get(&t.app, &format!("/projects/{project_id}/experiments")).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn job_from_preprocessed_experiment_uses_canonical_input(pool: PgPool) {
    let t = build_test_app(pool);
    let (project_id, reference_id, motion_id) = seed_assets(&t).await;

    let (_, dispatched) = post(
        &t.app,
        &format!("/projects/{project_id}/experiments/preprocess"),
        json!({"name": "to-dispatch", "reference_id": reference_id, "motion_id": motion_id}),
    )
    .await;
    let experiment_id = dispatched["experiment_id"].as_str().unwrap().to_string();
    let task_id = dispatched["task_id"].as_str().unwrap().to_string();

    // Worker produced the normalized pair_dir in the experiment's input/.
    let target = t.queue.last_task().payload["target_input_dir"]
        .as_str()
        .unwrap()
        .to_string();
    std::fs::write(std::path::Path::new(&target).join("ref_image.png"), b"png").unwrap();
    t.queue.script_success(
        &task_id,
        json!({"success": true, "input_dir": target.clone(), "stdout": "", "stderr": "", "return_code": 0}),
    );

    // Dispatching a job straight away works: the handler reconciles the
    // preprocess state before building the job.
    let (status, job) = post(
        &t.app,
        &format!("/projects/{project_id}/experiments/{experiment_id}/steadydancer/jobs"),
        json!({"base_seed": 7}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let job_id = job["job_id"].as_str().unwrap();

    let generation_task = t.queue.last_task();
    let input_dir = generation_task.payload["input_dir"].as_str().unwrap();
    assert!(input_dir.ends_with(&format!("jobs/{job_id}/input")));
    assert!(std::path::Path::new(input_dir).join("ref_image.png").is_file());
}
