//! Repository for the `experiments` table.

use sqlx::PgPool;
use steadydancer_core::types::EntityId;

use crate::models::experiment::{Experiment, NewExperiment};

const COLUMNS: &str = "\
    id, project_id, reference_id, motion_id, name, description, \
    input_dir, config, preprocess_task_id, preprocess_error, \
    created_at, updated_at";

/// Provides CRUD operations and preprocess-state updates for experiments.
pub struct ExperimentRepo;

impl ExperimentRepo {
    /// Insert a new experiment, returning the created row.
    pub async fn create(pool: &PgPool, input: &NewExperiment) -> Result<Experiment, sqlx::Error> {
        let query = format!(
            "INSERT INTO experiments
                 (id, project_id, reference_id, motion_id, name, description,
                  input_dir, config, preprocess_task_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Experiment>(&query)
            .bind(input.id)
            .bind(input.project_id)
            .bind(input.reference_id)
            .bind(input.motion_id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.input_dir)
            .bind(&input.config)
            .bind(&input.preprocess_task_id)
            .fetch_one(pool)
            .await
    }

    /// Find an experiment scoped to a project.
    pub async fn find_in_project(
        pool: &PgPool,
        project_id: EntityId,
        experiment_id: EntityId,
    ) -> Result<Option<Experiment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM experiments WHERE id = $1 AND project_id = $2");
        sqlx::query_as::<_, Experiment>(&query)
            .bind(experiment_id)
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }

    /// List a project's experiments, newest first.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: EntityId,
    ) -> Result<Vec<Experiment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM experiments WHERE project_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Experiment>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Record the canonical input directory produced by preprocessing.
    ///
    /// Guarded: only fills an empty `input_dir`, so a late or duplicate
    /// preprocess report cannot overwrite the canonical directory.
    /// Returns `true` if this call set it.
    pub async fn set_input_dir(
        pool: &PgPool,
        experiment_id: EntityId,
        input_dir: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE experiments
             SET input_dir = $2, preprocess_error = NULL, updated_at = NOW()
             WHERE id = $1 AND input_dir IS NULL",
        )
        .bind(experiment_id)
        .bind(input_dir)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a preprocess failure. Leaves `input_dir` untouched.
    pub async fn set_preprocess_error(
        pool: &PgPool,
        experiment_id: EntityId,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE experiments
             SET preprocess_error = $2, updated_at = NOW()
             WHERE id = $1 AND input_dir IS NULL",
        )
        .bind(experiment_id)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Point the experiment at a new preprocess task (retry after
    /// failure), clearing any recorded error.
    pub async fn set_preprocess_task(
        pool: &PgPool,
        experiment_id: EntityId,
        task_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE experiments
             SET preprocess_task_id = $2, preprocess_error = NULL, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(experiment_id)
        .bind(task_id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
