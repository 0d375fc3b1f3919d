//! Handlers for experiments and preprocess dispatch.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use steadydancer_core::types::EntityId;

use crate::error::AppResult;
use crate::services;
use crate::services::experiments::{CreateExperiment, PreprocessExperiment};
use crate::state::AppState;

/// Response for preprocess dispatch: the experiment plus its task handle.
#[derive(Debug, Serialize)]
pub struct PreprocessDispatched {
    pub experiment_id: EntityId,
    pub task_id: String,
}

/// POST /projects/{id}/experiments
///
/// Create an experiment directly from a ready pair_dir; the directory is
/// copied into the experiment's canonical `input/`.
pub async fn create_experiment(
    State(state): State<AppState>,
    Path(project_id): Path<EntityId>,
    Json(input): Json<CreateExperiment>,
) -> AppResult<impl IntoResponse> {
    let experiment = services::experiments::create_experiment(&state, project_id, input).await?;
    Ok((StatusCode::CREATED, Json(experiment)))
}

/// POST /projects/{id}/experiments/preprocess
///
/// Create an experiment asynchronously from a reference + motion asset
/// pair. The canonical input directory is produced by a queue task;
/// until it succeeds the experiment's `input_dir` stays null.
pub async fn create_experiment_with_preprocess(
    State(state): State<AppState>,
    Path(project_id): Path<EntityId>,
    Json(input): Json<PreprocessExperiment>,
) -> AppResult<impl IntoResponse> {
    let (experiment, task_id) =
        services::experiments::create_experiment_with_preprocess(&state, project_id, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(PreprocessDispatched {
            experiment_id: experiment.id,
            task_id,
        }),
    ))
}

/// POST /projects/{id}/experiments/{eid}/preprocess
///
/// Re-run preprocessing after a failure. 409 CONFLICT while a preprocess
/// task is still in flight or once the input directory exists.
pub async fn retry_preprocess(
    State(state): State<AppState>,
    Path((project_id, experiment_id)): Path<(EntityId, EntityId)>,
) -> AppResult<impl IntoResponse> {
    let (experiment, task_id) =
        services::experiments::retry_preprocess(&state, project_id, experiment_id).await?;
    Ok(Json(PreprocessDispatched {
        experiment_id: experiment.id,
        task_id,
    }))
}

/// GET /projects/{id}/experiments
pub async fn list_experiments(
    State(state): State<AppState>,
    Path(project_id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    let experiments = services::experiments::list_experiments(&state, project_id).await?;
    Ok(Json(experiments))
}

/// GET /projects/{id}/experiments/{eid}
///
/// Returns the experiment with the latest preprocess task state folded
/// in (a successful preprocess fills `input_dir` here).
pub async fn get_experiment(
    State(state): State<AppState>,
    Path((project_id, experiment_id)): Path<(EntityId, EntityId)>,
) -> AppResult<impl IntoResponse> {
    let experiment =
        services::experiments::get_experiment(&state, project_id, experiment_id).await?;
    Ok(Json(experiment))
}
