//! Integration tests for project CRUD, cascade deletion, and auth.

mod common;

use axum::http::{Method, StatusCode};
use common::{build_test_app, build_test_app_with, get, post, send_json};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "../db/migrations")]
async fn create_get_list_project(pool: PgPool) {
    let t = build_test_app(pool);

    let (status, created) = post(
        &t.app,
        "/projects",
        json!({"name": "Demo", "description": "scenario project"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Demo");
    let project_id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = get(&t.app, &format!("/projects/{project_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["description"], "scenario project");

    let (status, listed) = get(&t.app, "/projects").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn duplicate_project_name_is_conflict(pool: PgPool) {
    let t = build_test_app(pool);

    let (status, _) = post(&t.app, "/projects", json!({"name": "Demo"})).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = post(&t.app, "/projects", json!({"name": "Demo"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    // No second row was written.
    let (_, listed) = get(&t.app, "/projects").await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn empty_project_name_is_invalid(pool: PgPool) {
    let t = build_test_app(pool);

    let (status, body) = post(&t.app, "/projects", json!({"name": "   "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn deleting_a_project_removes_rows_and_directories(pool: PgPool) {
    let t = build_test_app(pool);

    let (_, project) = post(&t.app, "/projects", json!({"name": "Doomed"})).await;
    let project_id = project["id"].as_str().unwrap().to_string();

    // Ingest an asset so the project has a directory tree on disk.
    let image = t.repo_root.path().join("face.png");
    std::fs::write(&image, b"png-bytes").unwrap();
    let (status, _) = post(
        &t.app,
        &format!("/projects/{project_id}/refs"),
        json!({"name": "face", "source_image_path": "face.png"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let project_dir = t.data_root.path().join("projects").join(&project_id);
    assert!(project_dir.is_dir());

    let (status, _) = send_json(
        &t.app,
        Method::DELETE,
        &format!("/projects/{project_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = get(&t.app, &format!("/projects/{project_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!project_dir.exists());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn asset_ingestion_with_bad_source_writes_nothing(pool: PgPool) {
    let t = build_test_app(pool);

    let (_, project) = post(&t.app, "/projects", json!({"name": "Assets"})).await;
    let project_id = project["id"].as_str().unwrap().to_string();

    let (status, body) = post(
        &t.app,
        &format!("/projects/{project_id}/refs"),
        json!({"name": "ghost", "source_image_path": "missing/ghost.png"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (_, listed) = get(&t.app, &format!("/projects/{project_id}/refs")).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn relative_asset_paths_resolve_against_repo_root(pool: PgPool) {
    let t = build_test_app(pool);

    let (_, project) = post(&t.app, "/projects", json!({"name": "Paths"})).await;
    let project_id = project["id"].as_str().unwrap().to_string();

    std::fs::create_dir_all(t.repo_root.path().join("clips")).unwrap();
    std::fs::write(t.repo_root.path().join("clips/dance.mp4"), b"mp4").unwrap();

    let (status, asset) = post(
        &t.app,
        &format!("/projects/{project_id}/motions"),
        json!({"name": "dance", "source_video_path": "clips/dance.mp4"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // The ingested copy lives under the asset's own source/ directory.
    let stored = asset["video_path"].as_str().unwrap();
    assert!(stored.starts_with(t.data_root.path().to_str().unwrap()));
    assert!(stored.ends_with("source/dance.mp4"));
    assert!(std::path::Path::new(stored).is_file());
    // The original is copied, not moved.
    assert!(t.repo_root.path().join("clips/dance.mp4").is_file());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn api_key_guard_protects_project_routes(pool: PgPool) {
    let t = build_test_app_with(pool, |config| {
        config.api_key = Some("secret-key".to_string());
    });

    // Missing key.
    let (status, body) = get(&t.app, "/projects").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_API_KEY");

    // Wrong key.
    let request = axum::http::Request::builder()
        .method(Method::GET)
        .uri("/projects")
        .header("x-api-key", "wrong")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(t.app.clone(), request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Correct key.
    let request = axum::http::Request::builder()
        .method(Method::GET)
        .uri("/projects")
        .header("x-api-key", "secret-key")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(t.app.clone(), request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Health stays open.
    let (status, _) = get(&t.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
}
