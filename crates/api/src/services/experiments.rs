//! Experiment orchestration.
//!
//! Experiments come into existence two ways:
//!
//! - **directly**, from an already-prepared pair_dir: the directory is
//!   copied into the experiment's canonical `input/` synchronously;
//! - **via preprocessing**, from a reference + motion asset pair: the row
//!   is created with `input_dir = NULL` and a queue task builds the
//!   normalized input directory; reconciliation fills `input_dir` in on
//!   a later read.
//!
//! At most one preprocess task may be in flight per experiment; a second
//! request while one is pending is rejected with CONFLICT rather than
//! silently superseding the first.

use serde::Deserialize;
use serde_json::json;
use steadydancer_core::error::CoreError;
use steadydancer_core::generation::GenerationConfig;
use steadydancer_core::layout::{self, ExperimentPaths};
use steadydancer_core::types::EntityId;
use steadydancer_db::models::experiment::{Experiment, NewExperiment};
use steadydancer_db::repositories::{AssetRepo, ExperimentRepo};
use steadydancer_queue::messages::{PreprocessReport, TASK_PREPROCESS_EXPERIMENT};
use steadydancer_queue::{TaskRequest, TaskState};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::projects;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateExperiment {
    pub name: String,
    pub description: Option<String>,
    pub reference_id: Option<EntityId>,
    pub motion_id: Option<EntityId>,
    /// Path to a prepared pair_dir, copied into the experiment's `input/`.
    pub source_input_dir: String,
    pub config: Option<GenerationConfig>,
}

#[derive(Debug, Deserialize)]
pub struct PreprocessExperiment {
    pub name: String,
    pub description: Option<String>,
    pub reference_id: EntityId,
    pub motion_id: EntityId,
    pub config: Option<GenerationConfig>,
}

/// Create an experiment from a ready input directory.
pub async fn create_experiment(
    state: &AppState,
    project_id: EntityId,
    input: CreateExperiment,
) -> AppResult<Experiment> {
    projects::get_project(state, project_id).await?;
    validate_asset_links(state, project_id, input.reference_id, input.motion_id).await?;

    // Resolve before touching the filesystem so a bad path has no side
    // effects.
    let source_dir = state.resolver.resolve_dir(&input.source_input_dir)?;

    let experiment_id = Uuid::new_v4();
    let paths = state
        .layout
        .ensure_experiment_dirs(project_id, experiment_id)?;
    layout::copy_dir_contents(&source_dir, &paths.input_dir)?;

    let config_value = input
        .config
        .as_ref()
        .map(serde_json::to_value)
        .transpose()?;
    write_config_snapshot(&paths, config_value.as_ref());

    let experiment = ExperimentRepo::create(
        &state.pool,
        &NewExperiment {
            id: experiment_id,
            project_id,
            reference_id: input.reference_id,
            motion_id: input.motion_id,
            name: input.name,
            description: input.description,
            input_dir: Some(paths.input_dir.display().to_string()),
            config: config_value,
            preprocess_task_id: None,
        },
    )
    .await?;

    tracing::info!(project_id = %project_id, experiment_id = %experiment.id, "Experiment created");
    Ok(experiment)
}

/// Create an experiment from a reference + motion asset pair and enqueue
/// the preprocess task that will produce its normalized input directory.
pub async fn create_experiment_with_preprocess(
    state: &AppState,
    project_id: EntityId,
    input: PreprocessExperiment,
) -> AppResult<(Experiment, String)> {
    projects::get_project(state, project_id).await?;

    let reference = AssetRepo::find_reference_in_project(&state.pool, project_id, input.reference_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "ReferenceAsset",
            id: input.reference_id,
        })?;
    let motion = AssetRepo::find_motion_in_project(&state.pool, project_id, input.motion_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "MotionAsset",
            id: input.motion_id,
        })?;

    let experiment_id = Uuid::new_v4();
    let paths = state
        .layout
        .ensure_experiment_dirs(project_id, experiment_id)?;

    let request = TaskRequest::new(
        TASK_PREPROCESS_EXPERIMENT,
        preprocess_payload(
            project_id,
            experiment_id,
            &reference.image_path,
            &motion.video_path,
            &paths,
            input.config.as_ref(),
        ),
    );
    state.queue.enqueue(&request).await?;

    let config_value = input
        .config
        .as_ref()
        .map(serde_json::to_value)
        .transpose()?;
    write_config_snapshot(&paths, config_value.as_ref());

    let experiment = ExperimentRepo::create(
        &state.pool,
        &NewExperiment {
            id: experiment_id,
            project_id,
            reference_id: Some(input.reference_id),
            motion_id: Some(input.motion_id),
            name: input.name,
            description: input.description,
            // Stays NULL until the preprocess task succeeds.
            input_dir: None,
            config: config_value,
            preprocess_task_id: Some(request.task_id.clone()),
        },
    )
    .await?;

    tracing::info!(
        project_id = %project_id,
        experiment_id = %experiment.id,
        task_id = %request.task_id,
        "Experiment preprocess dispatched",
    );
    Ok((experiment, request.task_id))
}

/// Re-run preprocessing for an experiment whose previous attempt failed
/// or vanished. Rejected while a preprocess task is still in flight or
/// once the canonical input directory exists.
pub async fn retry_preprocess(
    state: &AppState,
    project_id: EntityId,
    experiment_id: EntityId,
) -> AppResult<(Experiment, String)> {
    let experiment = get_experiment_raw(state, project_id, experiment_id).await?;

    if experiment.input_dir.is_some() {
        return Err(AppError::Core(CoreError::Conflict(
            "Experiment already has a canonical input directory".into(),
        )));
    }

    let (Some(reference_id), Some(motion_id)) = (experiment.reference_id, experiment.motion_id)
    else {
        return Err(AppError::Core(CoreError::InvalidInput(
            "Experiment has no reference/motion assets to preprocess".into(),
        )));
    };

    // Only one preprocess task in flight per experiment.
    if let Some(task_id) = &experiment.preprocess_task_id {
        if let Some(status) = state.queue.status(task_id).await? {
            if matches!(status.state, TaskState::Pending | TaskState::Started) {
                return Err(AppError::Core(CoreError::Conflict(format!(
                    "A preprocess task is already in flight for this experiment: {task_id}"
                ))));
            }
        }
    }

    let reference = AssetRepo::find_reference_in_project(&state.pool, project_id, reference_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "ReferenceAsset",
            id: reference_id,
        })?;
    let motion = AssetRepo::find_motion_in_project(&state.pool, project_id, motion_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "MotionAsset",
            id: motion_id,
        })?;

    let paths = state
        .layout
        .ensure_experiment_dirs(project_id, experiment_id)?;
    let config = experiment
        .config
        .clone()
        .map(serde_json::from_value::<GenerationConfig>)
        .transpose()
        .map_err(|e| AppError::InternalError(format!("stored experiment config is invalid: {e}")))?;

    let request = TaskRequest::new(
        TASK_PREPROCESS_EXPERIMENT,
        preprocess_payload(
            project_id,
            experiment_id,
            &reference.image_path,
            &motion.video_path,
            &paths,
            config.as_ref(),
        ),
    );
    state.queue.enqueue(&request).await?;
    ExperimentRepo::set_preprocess_task(&state.pool, experiment_id, &request.task_id).await?;

    let experiment = get_experiment_raw(state, project_id, experiment_id).await?;
    tracing::info!(
        experiment_id = %experiment_id,
        task_id = %request.task_id,
        "Experiment preprocess re-dispatched",
    );
    Ok((experiment, request.task_id))
}

/// Fetch an experiment and fold the latest preprocess task state into it.
///
/// Success fills the canonical `input_dir` exactly once (guarded update);
/// failure records the error text. Experiments whose `input_dir` is
/// already set are returned untouched.
pub async fn get_experiment(
    state: &AppState,
    project_id: EntityId,
    experiment_id: EntityId,
) -> AppResult<Experiment> {
    let experiment = get_experiment_raw(state, project_id, experiment_id).await?;

    if experiment.input_dir.is_some() {
        return Ok(experiment);
    }
    let Some(task_id) = experiment.preprocess_task_id.clone() else {
        return Ok(experiment);
    };

    match state.queue.status(&task_id).await? {
        Some(status) => match status.state {
            TaskState::Pending | TaskState::Started => {}
            TaskState::Success => {
                let report: Option<PreprocessReport> = status
                    .result
                    .clone()
                    .map(serde_json::from_value)
                    .transpose()
                    .unwrap_or_default();

                match report {
                    Some(report) if report.success => {
                        let paths = state
                            .layout
                            .ensure_experiment_dirs(project_id, experiment_id)?;
                        let input_dir = report
                            .input_dir
                            .unwrap_or_else(|| paths.input_dir.display().to_string());
                        ExperimentRepo::set_input_dir(&state.pool, experiment_id, &input_dir)
                            .await?;
                    }
                    Some(report) => {
                        let detail = if report.stderr.is_empty() {
                            "preprocess reported failure".to_string()
                        } else {
                            report.stderr
                        };
                        ExperimentRepo::set_preprocess_error(&state.pool, experiment_id, &detail)
                            .await?;
                    }
                    None => {
                        ExperimentRepo::set_preprocess_error(
                            &state.pool,
                            experiment_id,
                            "preprocess finished without a report",
                        )
                        .await?;
                    }
                }
            }
            TaskState::Failure => {
                let detail = status
                    .error
                    .unwrap_or_else(|| "preprocess task failed".into());
                ExperimentRepo::set_preprocess_error(&state.pool, experiment_id, &detail).await?;
            }
            TaskState::Revoked => {
                ExperimentRepo::set_preprocess_error(
                    &state.pool,
                    experiment_id,
                    "preprocess task was revoked",
                )
                .await?;
            }
        },
        None => {
            // Task unknown to the queue: expire it once the staleness
            // window has passed since the task was (re-)dispatched.
            let age = chrono::Utc::now()
                .signed_duration_since(experiment.updated_at)
                .num_seconds();
            if age > state.config.task_staleness_secs {
                ExperimentRepo::set_preprocess_error(
                    &state.pool,
                    experiment_id,
                    "preprocess task expired: unknown to the queue",
                )
                .await?;
            }
        }
    }

    get_experiment_raw(state, project_id, experiment_id).await
}

pub async fn list_experiments(
    state: &AppState,
    project_id: EntityId,
) -> AppResult<Vec<Experiment>> {
    projects::get_project(state, project_id).await?;
    Ok(ExperimentRepo::list_by_project(&state.pool, project_id).await?)
}

async fn get_experiment_raw(
    state: &AppState,
    project_id: EntityId,
    experiment_id: EntityId,
) -> AppResult<Experiment> {
    ExperimentRepo::find_in_project(&state.pool, project_id, experiment_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Experiment",
            id: experiment_id,
        }))
}

async fn validate_asset_links(
    state: &AppState,
    project_id: EntityId,
    reference_id: Option<EntityId>,
    motion_id: Option<EntityId>,
) -> AppResult<()> {
    if let Some(id) = reference_id {
        AssetRepo::find_reference_in_project(&state.pool, project_id, id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "ReferenceAsset",
                id,
            })?;
    }
    if let Some(id) = motion_id {
        AssetRepo::find_motion_in_project(&state.pool, project_id, id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "MotionAsset",
                id,
            })?;
    }
    Ok(())
}

fn preprocess_payload(
    project_id: EntityId,
    experiment_id: EntityId,
    reference_image_path: &str,
    motion_video_path: &str,
    paths: &ExperimentPaths,
    config: Option<&GenerationConfig>,
) -> serde_json::Value {
    json!({
        "project_id": project_id,
        "experiment_id": experiment_id,
        "reference_image_path": reference_image_path,
        "motion_video_path": motion_video_path,
        "target_input_dir": paths.input_dir.display().to_string(),
        "prompt": config.and_then(|c| c.prompt_override.clone()),
    })
}

/// Mirror the config to `config.json` next to the input directory.
/// Best-effort; a write failure never fails the request.
fn write_config_snapshot(paths: &ExperimentPaths, config: Option<&serde_json::Value>) {
    let Some(config) = config else { return };
    match serde_json::to_vec_pretty(config) {
        Ok(bytes) => {
            if let Err(e) = std::fs::write(&paths.config_path, bytes) {
                tracing::warn!(error = %e, path = %paths.config_path.display(), "Failed to write config.json");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to serialize experiment config"),
    }
}
