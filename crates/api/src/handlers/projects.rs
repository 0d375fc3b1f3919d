//! Handlers for the `/projects` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use steadydancer_core::types::EntityId;
use steadydancer_db::models::project::CreateProject;

use crate::error::AppResult;
use crate::services;
use crate::state::AppState;

/// POST /projects
///
/// Create a new project for grouping assets, experiments, and jobs.
/// Duplicate names return 409 CONFLICT with no row written.
pub async fn create_project(
    State(state): State<AppState>,
    Json(input): Json<CreateProject>,
) -> AppResult<impl IntoResponse> {
    let project = services::projects::create_project(&state, input).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /projects
pub async fn list_projects(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let projects = services::projects::list_projects(&state).await?;
    Ok(Json(projects))
}

/// GET /projects/{id}
pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    let project = services::projects::get_project(&state, project_id).await?;
    Ok(Json(project))
}

/// DELETE /projects/{id}
///
/// Deletes the project, all child rows (cascade), and the project's
/// directory tree. Returns 204.
pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    services::projects::delete_project(&state, project_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
