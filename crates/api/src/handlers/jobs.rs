//! Handlers for SteadyDancer generation jobs.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use steadydancer_core::types::EntityId;
use steadydancer_db::models::job::Job;
use steadydancer_queue::messages::GenerationReport;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::services;
use crate::services::jobs::CreateJob;
use crate::state::AppState;

/// Response for job dispatch.
#[derive(Debug, Serialize)]
pub struct JobDispatched {
    pub project_id: EntityId,
    pub job_id: EntityId,
    pub task_id: String,
}

/// Reconciled job status response.
#[derive(Debug, Serialize)]
pub struct JobStatusView {
    pub project_id: EntityId,
    pub job_id: EntityId,
    pub task_id: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GenerationReport>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelJob {
    pub reason: Option<String>,
}

fn dispatched(job: &Job) -> JobDispatched {
    JobDispatched {
        project_id: job.project_id,
        job_id: job.id,
        task_id: job.task_id.clone(),
    }
}

/// POST /projects/{id}/steadydancer/jobs
///
/// Dispatch a generation job from a caller-supplied input directory.
pub async fn create_project_job(
    State(state): State<AppState>,
    Path(project_id): Path<EntityId>,
    Json(input): Json<CreateJob>,
) -> AppResult<impl IntoResponse> {
    let job = services::jobs::create_job(&state, project_id, None, input).await?;
    Ok((StatusCode::CREATED, Json(dispatched(&job))))
}

/// POST /projects/{id}/experiments/{eid}/steadydancer/jobs
///
/// Dispatch a generation job from an experiment. The experiment's
/// canonical input directory is preferred as the source and its config
/// supplies parameter defaults; request fields override them.
pub async fn create_experiment_job(
    State(state): State<AppState>,
    Path((project_id, experiment_id)): Path<(EntityId, EntityId)>,
    Json(input): Json<CreateJob>,
) -> AppResult<impl IntoResponse> {
    // Reconciles preprocess state first, so a freshly-preprocessed
    // experiment is dispatchable without an intervening GET.
    let experiment =
        services::experiments::get_experiment(&state, project_id, experiment_id).await?;
    let job = services::jobs::create_job(&state, project_id, Some(&experiment), input).await?;
    Ok((StatusCode::CREATED, Json(dispatched(&job))))
}

/// GET /projects/{id}/steadydancer/jobs
pub async fn list_project_jobs(
    State(state): State<AppState>,
    Path(project_id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    let jobs = services::jobs::list_project_jobs(&state, project_id).await?;
    Ok(Json(jobs))
}

/// GET /projects/{id}/experiments/{eid}/steadydancer/jobs
pub async fn list_experiment_jobs(
    State(state): State<AppState>,
    Path((project_id, experiment_id)): Path<(EntityId, EntityId)>,
) -> AppResult<impl IntoResponse> {
    let jobs = services::jobs::list_experiment_jobs(&state, project_id, experiment_id).await?;
    Ok(Json(jobs))
}

/// GET /projects/{id}/steadydancer/jobs/{jid}
///
/// Reconciled status: queue state is folded into the persisted row on
/// every read. Upstream failures surface as data in the response, never
/// as an error status for the query itself.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path((project_id, job_id)): Path<(EntityId, EntityId)>,
) -> AppResult<impl IntoResponse> {
    let job = services::jobs::get_job(&state, project_id, job_id).await?;
    let (job, queue_status) = services::jobs::refresh_job(&state, job).await?;
    let result = services::jobs::job_result(&state, &job, queue_status).await?;

    Ok(Json(JobStatusView {
        project_id,
        job_id: job.id,
        task_id: job.task_id.clone(),
        state: job.status.clone(),
        result,
    }))
}

/// POST /projects/{id}/steadydancer/jobs/{jid}/cancel
///
/// Cancel a pending or started job. Calling cancel on an already-terminal
/// job is a no-op that reports the existing terminal state.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path((project_id, job_id)): Path<(EntityId, EntityId)>,
    body: Option<Json<CancelJob>>,
) -> AppResult<impl IntoResponse> {
    let reason = body.and_then(|Json(b)| b.reason);
    let job = services::jobs::cancel_job(&state, project_id, job_id, reason).await?;

    Ok(Json(JobStatusView {
        project_id,
        job_id: job.id,
        task_id: job.task_id.clone(),
        state: job.status.clone(),
        result: None,
    }))
}

/// GET /projects/{id}/steadydancer/jobs/{jid}/download
///
/// Stream the result video. 404 unless the job succeeded and the file
/// exists on disk.
pub async fn download_job_video(
    State(state): State<AppState>,
    Path((project_id, job_id)): Path<(EntityId, EntityId)>,
) -> AppResult<Response> {
    let job = services::jobs::get_job(&state, project_id, job_id).await?;

    if job.success != Some(true) {
        return Err(AppError::NotFoundMessage(
            "Job has no completed result video.".into(),
        ));
    }
    let result_path = job.result_path.as_deref().ok_or_else(|| {
        AppError::NotFoundMessage("Job has no completed result video.".into())
    })?;

    let file = tokio::fs::File::open(result_path).await.map_err(|_| {
        AppError::NotFoundMessage("Result video file not found on disk.".into())
    })?;

    let filename = std::path::Path::new(result_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("result.mp4")
        .to_string();

    let body = Body::from_stream(ReaderStream::new(file));
    let response = Response::builder()
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(body)
        .map_err(|e| AppError::InternalError(format!("failed to build response: {e}")))?;

    Ok(response)
}
