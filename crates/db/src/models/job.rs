//! Generation job entity model and DTOs.

use serde::Serialize;
use sqlx::FromRow;
use steadydancer_core::error::CoreError;
use steadydancer_core::status::JobStatus;
use steadydancer_core::types::{EntityId, Timestamp};

/// Job type string for I2V generation jobs.
pub const JOB_TYPE_I2V: &str = "steadydancer_i2v";

/// A row from the `jobs` table.
///
/// `params` is the resolved generation config snapshot taken at dispatch
/// time; it is never updated, which keeps the job reproducible even if
/// the owning experiment's config changes later.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: EntityId,
    pub project_id: EntityId,
    pub experiment_id: Option<EntityId>,
    /// Handle into the external task queue. Unique per job.
    pub task_id: String,
    pub job_type: String,
    pub status: String,
    /// The job-private copy of its input directory.
    pub input_dir: String,
    pub params: serde_json::Value,
    pub success: Option<bool>,
    /// Final artifact location; always inside this job's `output/`.
    pub result_path: Option<String>,
    pub error_message: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub canceled_at: Option<Timestamp>,
}

impl Job {
    pub fn job_status(&self) -> Result<JobStatus, CoreError> {
        JobStatus::parse(&self.status)
    }
}

/// Insert payload for a job. The id is allocated by the caller because
/// the on-disk directory tree is created before the row.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: EntityId,
    pub project_id: EntityId,
    pub experiment_id: Option<EntityId>,
    pub task_id: String,
    pub job_type: String,
    pub input_dir: String,
    pub params: serde_json::Value,
}
