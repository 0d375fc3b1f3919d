//! Experiment entity model and DTOs.

use serde::Serialize;
use sqlx::FromRow;
use steadydancer_core::types::{EntityId, Timestamp};

/// A row from the `experiments` table.
///
/// `input_dir` is the canonical normalized input directory. It is set at
/// creation for directly-created experiments and stays `NULL` for
/// preprocess-created ones until the preprocess task succeeds.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Experiment {
    pub id: EntityId,
    pub project_id: EntityId,
    pub reference_id: Option<EntityId>,
    pub motion_id: Option<EntityId>,
    pub name: String,
    pub description: Option<String>,
    pub input_dir: Option<String>,
    pub config: Option<serde_json::Value>,
    pub preprocess_task_id: Option<String>,
    pub preprocess_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Insert payload for an experiment. The id is allocated by the caller
/// because the on-disk directory is created before the row.
#[derive(Debug, Clone)]
pub struct NewExperiment {
    pub id: EntityId,
    pub project_id: EntityId,
    pub reference_id: Option<EntityId>,
    pub motion_id: Option<EntityId>,
    pub name: String,
    pub description: Option<String>,
    pub input_dir: Option<String>,
    pub config: Option<serde_json::Value>,
    pub preprocess_task_id: Option<String>,
}
