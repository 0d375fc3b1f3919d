//! Repository for the `jobs` table.
//!
//! Every status transition is a guarded atomic update on the row:
//! terminal states can only be entered from a non-terminal state, so the
//! first terminal write wins and replays (a second reconcile pass, a
//! cancel racing a completion) change nothing. The row is the concurrency
//! boundary; no in-process locks exist.

use sqlx::PgPool;
use steadydancer_core::status::JobStatus;
use steadydancer_core::types::EntityId;

use crate::models::job::{Job, NewJob};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, project_id, experiment_id, task_id, job_type, status, \
    input_dir, params, success, result_path, error_message, cancel_reason, \
    created_at, updated_at, started_at, finished_at, canceled_at";

/// SQL fragment for the terminal status set.
const TERMINAL_SET: &str = "('SUCCESS', 'FAILURE', 'CANCELED', 'EXPIRED')";

/// Provides persistence and guarded transitions for generation jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new job in `PENDING` status, returning the created row.
    pub async fn create(pool: &PgPool, input: &NewJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs
                 (id, project_id, experiment_id, task_id, job_type, status, input_dir, params)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(input.id)
            .bind(input.project_id)
            .bind(input.experiment_id)
            .bind(&input.task_id)
            .bind(&input.job_type)
            .bind(JobStatus::Pending.as_str())
            .bind(&input.input_dir)
            .bind(&input.params)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: EntityId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a job scoped to a project.
    pub async fn find_in_project(
        pool: &PgPool,
        project_id: EntityId,
        job_id: EntityId,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1 AND project_id = $2");
        sqlx::query_as::<_, Job>(&query)
            .bind(job_id)
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }

    /// List a project's jobs, newest first.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: EntityId,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM jobs WHERE project_id = $1 ORDER BY created_at DESC");
        sqlx::query_as::<_, Job>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// List jobs dispatched from a specific experiment, newest first.
    pub async fn list_by_experiment(
        pool: &PgPool,
        project_id: EntityId,
        experiment_id: EntityId,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs
             WHERE project_id = $1 AND experiment_id = $2
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(project_id)
            .bind(experiment_id)
            .fetch_all(pool)
            .await
    }

    /// Transition `PENDING` -> `STARTED`, stamping `started_at` once.
    /// Returns `true` if the row moved.
    pub async fn mark_started(pool: &PgPool, job_id: EntityId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs
             SET status = $2, started_at = COALESCE(started_at, NOW()), updated_at = NOW()
             WHERE id = $1 AND status = $3",
        )
        .bind(job_id)
        .bind(JobStatus::Started.as_str())
        .bind(JobStatus::Pending.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Terminal transition to `SUCCESS` with the normalized artifact path
    /// (absent when the worker reported success without an artifact).
    /// Returns `true` if this call won the terminal write.
    pub async fn complete(
        pool: &PgPool,
        job_id: EntityId,
        result_path: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE jobs
             SET status = $2, success = TRUE, result_path = $3,
                 finished_at = COALESCE(finished_at, NOW()), updated_at = NOW()
             WHERE id = $1 AND status NOT IN {TERMINAL_SET}"
        );
        let result = sqlx::query(&query)
            .bind(job_id)
            .bind(JobStatus::Success.as_str())
            .bind(result_path)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Terminal transition to `FAILURE` with the queue's error payload.
    pub async fn fail(
        pool: &PgPool,
        job_id: EntityId,
        error_message: &str,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE jobs
             SET status = $2, success = FALSE, error_message = $3,
                 finished_at = COALESCE(finished_at, NOW()), updated_at = NOW()
             WHERE id = $1 AND status NOT IN {TERMINAL_SET}"
        );
        let result = sqlx::query(&query)
            .bind(job_id)
            .bind(JobStatus::Failure.as_str())
            .bind(error_message)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Terminal transition to `CANCELED`. Permitted only from `PENDING`
    /// or `STARTED`; returns `false` when a terminal state was already
    /// recorded (that state wins).
    pub async fn cancel(
        pool: &PgPool,
        job_id: EntityId,
        reason: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs
             SET status = $2, cancel_reason = $3,
                 canceled_at = COALESCE(canceled_at, NOW()),
                 finished_at = COALESCE(finished_at, NOW()),
                 updated_at = NOW()
             WHERE id = $1 AND status IN ($4, $5)",
        )
        .bind(job_id)
        .bind(JobStatus::Canceled.as_str())
        .bind(reason)
        .bind(JobStatus::Pending.as_str())
        .bind(JobStatus::Started.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Terminal transition to `EXPIRED`, for tasks the queue no longer
    /// knows about past the staleness window.
    pub async fn expire(pool: &PgPool, job_id: EntityId) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE jobs
             SET status = $2,
                 finished_at = COALESCE(finished_at, NOW()), updated_at = NOW()
             WHERE id = $1 AND status NOT IN {TERMINAL_SET}"
        );
        let result = sqlx::query(&query)
            .bind(job_id)
            .bind(JobStatus::Expired.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
