//! Job orchestration and task-state reconciliation.
//!
//! `create_job` is the only place a generation task enters the queue:
//! resolve the input, lay out the job's private directory tree, snapshot
//! the parameters, enqueue exactly one task, persist the row. The queue
//! stays the source of truth for execution state; `refresh_job` folds the
//! latest queue state into the persisted row on every status read.

use std::path::Path;

use serde::Deserialize;
use serde_json::json;
use steadydancer_core::error::CoreError;
use steadydancer_core::generation::{GenerationConfig, GenerationOverrides};
use steadydancer_core::layout;
use steadydancer_core::status::JobStatus;
use steadydancer_core::types::EntityId;
use steadydancer_db::models::experiment::Experiment;
use steadydancer_db::models::job::{Job, NewJob, JOB_TYPE_I2V};
use steadydancer_db::repositories::JobRepo;
use steadydancer_queue::messages::{GenerationReport, TASK_GENERATE_I2V};
use steadydancer_queue::{TaskRequest, TaskState, TaskStatus};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::projects;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateJob {
    /// Directory containing preprocessed inputs (pair_dir). Optional when
    /// dispatching from an experiment with a canonical input directory.
    pub input_dir: Option<String>,
    /// Request-level parameter overrides, merged over the experiment's
    /// config defaults.
    #[serde(flatten)]
    pub overrides: GenerationOverrides,
}

/// Create a generation job and dispatch its queue task.
///
/// When `experiment` is given, its canonical `input_dir` is preferred as
/// the source and its config supplies the parameter defaults. All
/// validation happens before the first side effect.
pub async fn create_job(
    state: &AppState,
    project_id: EntityId,
    experiment: Option<&Experiment>,
    input: CreateJob,
) -> AppResult<Job> {
    projects::get_project(state, project_id).await?;

    // Pick and resolve the source input directory.
    let source_dir = match experiment.and_then(|e| e.input_dir.as_deref()) {
        Some(dir) => state.resolver.resolve_dir(dir)?,
        None => {
            let raw = input.input_dir.as_deref().ok_or_else(|| {
                CoreError::InvalidInput("input_dir is required for this job".into())
            })?;
            state.resolver.resolve_dir(raw)?
        }
    };

    // Freeze the parameter snapshot: experiment defaults, then request
    // overrides.
    let base_config = experiment
        .and_then(|e| e.config.clone())
        .map(serde_json::from_value::<GenerationConfig>)
        .transpose()
        .map_err(|e| AppError::InternalError(format!("stored experiment config is invalid: {e}")))?
        .unwrap_or_default();
    let params = base_config.apply(&input.overrides);

    // Private directory tree + input copy.
    let job_id = Uuid::new_v4();
    let paths = state.layout.ensure_job_dirs(project_id, job_id)?;
    layout::copy_dir_contents(&source_dir, &paths.input_dir)?;
    let input_dir = paths.input_dir.display().to_string();

    // Exactly one task per job. The row is written after the enqueue; a
    // crash in between leaves an orphaned task that no row points at,
    // and its record ages out of the result backend.
    let request = TaskRequest::new(
        TASK_GENERATE_I2V,
        json!({
            "job_id": job_id,
            "input_dir": input_dir,
            "params": params,
        }),
    );
    state.queue.enqueue(&request).await?;

    let job = JobRepo::create(
        &state.pool,
        &NewJob {
            id: job_id,
            project_id,
            experiment_id: experiment.map(|e| e.id),
            task_id: request.task_id,
            job_type: JOB_TYPE_I2V.to_string(),
            input_dir,
            params: serde_json::to_value(&params)?,
        },
    )
    .await?;

    tracing::info!(
        project_id = %project_id,
        job_id = %job.id,
        task_id = %job.task_id,
        "Job dispatched",
    );
    Ok(job)
}

/// Fetch a job scoped to a project.
pub async fn get_job(state: &AppState, project_id: EntityId, job_id: EntityId) -> AppResult<Job> {
    JobRepo::find_in_project(&state.pool, project_id, job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))
}

/// Map the queue's view of a job's task onto the persisted row.
///
/// Already-terminal rows short-circuit: the queue is not consulted and no
/// files move, which makes reconciliation idempotent. Returns the fresh
/// row plus the queue status when one was fetched.
pub async fn refresh_job(state: &AppState, job: Job) -> AppResult<(Job, Option<TaskStatus>)> {
    if job.job_status()?.is_terminal() {
        return Ok((job, None));
    }

    let queue_status = state.queue.status(&job.task_id).await?;

    match &queue_status {
        None => {
            // Unknown to the queue. Within the staleness window that just
            // means "not picked up yet" (or a momentarily blind backend);
            // past it, the job is expired.
            let age = chrono::Utc::now()
                .signed_duration_since(job.created_at)
                .num_seconds();
            if age > state.config.task_staleness_secs {
                JobRepo::expire(&state.pool, job.id).await?;
                tracing::warn!(job_id = %job.id, task_id = %job.task_id, "Job expired: task unknown to queue");
            }
        }
        Some(status) => match status.state {
            TaskState::Pending => {}
            TaskState::Started => {
                JobRepo::mark_started(&state.pool, job.id).await?;
            }
            TaskState::Success => {
                apply_success(state, &job, status).await?;
            }
            TaskState::Failure => {
                let detail = failure_detail(status);
                JobRepo::fail(&state.pool, job.id, &detail).await?;
            }
            TaskState::Revoked => {
                // CANCELED unless a terminal state is already recorded.
                JobRepo::cancel(&state.pool, job.id, None).await?;
            }
        },
    }

    let fresh = get_job(state, job.project_id, job.id).await?;
    Ok((fresh, queue_status))
}

/// Best error text for a FAILURE state: the queue's error payload, the
/// worker report's stderr, or a placeholder.
fn failure_detail(status: &TaskStatus) -> String {
    if let Some(error) = &status.error {
        return error.clone();
    }
    if let Some(stderr) = status
        .result
        .as_ref()
        .and_then(|r| r.get("stderr"))
        .and_then(|v| v.as_str())
    {
        if !stderr.is_empty() {
            return stderr.to_string();
        }
    }
    "task failed without error detail".to_string()
}

/// Handle a SUCCESS report: normalize the artifact into the job's
/// `output/` and record the terminal state.
async fn apply_success(state: &AppState, job: &Job, status: &TaskStatus) -> AppResult<()> {
    let report: Option<GenerationReport> = status
        .result
        .clone()
        .map(serde_json::from_value)
        .transpose()
        .unwrap_or_else(|e| {
            tracing::warn!(job_id = %job.id, error = %e, "Unparseable worker report");
            None
        });

    let Some(report) = report else {
        JobRepo::fail(&state.pool, job.id, "task succeeded without a worker report").await?;
        return Ok(());
    };

    if !report.success {
        let detail = if report.stderr.is_empty() {
            "worker reported failure".to_string()
        } else {
            report.stderr.clone()
        };
        JobRepo::fail(&state.pool, job.id, &detail).await?;
        return Ok(());
    }

    let result_path = match report.video_path.as_deref() {
        Some(video_path) => Some(normalize_artifact(state, job, video_path)?),
        None => None,
    };
    JobRepo::complete(&state.pool, job.id, result_path.as_deref()).await?;
    Ok(())
}

/// Move the worker-reported artifact into this job's `output/`.
///
/// If the reported file is gone but a file of the same name already sits
/// in `output/`, a previous pass moved it and that path is reused. If
/// neither exists the raw reported path is kept for debugging, matching
/// what the worker said rather than inventing a location.
fn normalize_artifact(state: &AppState, job: &Job, video_path: &str) -> AppResult<String> {
    let src = Path::new(video_path);
    let paths = state.layout.ensure_job_dirs(job.project_id, job.id)?;

    if src.is_file() {
        let dest = layout::move_file_into(src, &paths.output_dir)?;
        return Ok(dest.display().to_string());
    }

    if let Some(name) = src.file_name() {
        let dest = paths.output_dir.join(name);
        if dest.is_file() {
            return Ok(dest.display().to_string());
        }
    }

    tracing::warn!(
        job_id = %job.id,
        video_path = %video_path,
        "Worker-reported artifact not found on disk",
    );
    Ok(video_path.to_string())
}

/// Cancel a job.
///
/// A no-op on already-terminal jobs: the existing terminal row is
/// returned rather than an error, because cancellation racing completion
/// is expected. Otherwise the queue task is revoked and the row moves to
/// CANCELED — unless a terminal report won the race in between, in which
/// case that state sticks.
pub async fn cancel_job(
    state: &AppState,
    project_id: EntityId,
    job_id: EntityId,
    reason: Option<String>,
) -> AppResult<Job> {
    let job = get_job(state, project_id, job_id).await?;

    if job.job_status()?.is_terminal() {
        return Ok(job);
    }

    state.queue.revoke(&job.task_id).await?;

    let canceled = JobRepo::cancel(&state.pool, job.id, reason.as_deref()).await?;
    if canceled {
        tracing::info!(job_id = %job.id, task_id = %job.task_id, "Job canceled");
    } else {
        tracing::debug!(job_id = %job.id, "Cancel lost the race to a terminal transition");
    }

    get_job(state, project_id, job_id).await
}

/// Build the result payload for a status response.
///
/// For finished jobs the queue's report (when still available) is echoed
/// back with `video_path` rewritten to the normalized location; `fetched`
/// reuses a status already retrieved during reconciliation to avoid a
/// second queue round-trip.
pub async fn job_result(
    state: &AppState,
    job: &Job,
    fetched: Option<TaskStatus>,
) -> AppResult<Option<GenerationReport>> {
    let job_status = job.job_status()?;
    if !matches!(job_status, JobStatus::Success | JobStatus::Failure) {
        return Ok(None);
    }

    let status = match fetched {
        Some(status) => Some(status),
        None => state.queue.status(&job.task_id).await?,
    };

    let mut report: Option<GenerationReport> = status
        .and_then(|s| s.result)
        .map(serde_json::from_value)
        .transpose()
        .unwrap_or_default();

    if let Some(report) = &mut report {
        report.video_path = job.result_path.clone();
    }
    Ok(report)
}

pub async fn list_project_jobs(state: &AppState, project_id: EntityId) -> AppResult<Vec<Job>> {
    projects::get_project(state, project_id).await?;
    Ok(JobRepo::list_by_project(&state.pool, project_id).await?)
}

pub async fn list_experiment_jobs(
    state: &AppState,
    project_id: EntityId,
    experiment_id: EntityId,
) -> AppResult<Vec<Job>> {
    Ok(JobRepo::list_by_experiment(&state.pool, project_id, experiment_id).await?)
}
