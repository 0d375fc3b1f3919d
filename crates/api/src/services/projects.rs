//! Project lifecycle.

use steadydancer_core::error::CoreError;
use steadydancer_core::types::EntityId;
use steadydancer_db::models::project::{CreateProject, Project};
use steadydancer_db::repositories::ProjectRepo;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub async fn create_project(state: &AppState, input: CreateProject) -> AppResult<Project> {
    if input.name.trim().is_empty() {
        return Err(AppError::Core(CoreError::InvalidInput(
            "Project name must not be empty".into(),
        )));
    }

    // Duplicate names fail the insert on uq_projects_name; the error
    // layer maps that to 409 CONFLICT, and nothing is written.
    let project = ProjectRepo::create(&state.pool, Uuid::new_v4(), &input).await?;

    tracing::info!(project_id = %project.id, name = %project.name, "Project created");
    Ok(project)
}

pub async fn get_project(state: &AppState, project_id: EntityId) -> AppResult<Project> {
    ProjectRepo::find_by_id(&state.pool, project_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id: project_id,
        }))
}

pub async fn list_projects(state: &AppState) -> AppResult<Vec<Project>> {
    Ok(ProjectRepo::list(&state.pool).await?)
}

/// Delete a project. Child rows cascade in the database; the project's
/// whole directory tree goes with them.
pub async fn delete_project(state: &AppState, project_id: EntityId) -> AppResult<()> {
    let deleted = ProjectRepo::delete(&state.pool, project_id).await?;
    if !deleted {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id: project_id,
        }));
    }

    state.layout.remove_project_root(project_id)?;

    tracing::info!(project_id = %project_id, "Project deleted");
    Ok(())
}
