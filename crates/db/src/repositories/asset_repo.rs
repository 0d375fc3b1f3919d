//! Repository for the `reference_assets` and `motion_assets` tables.
//!
//! The two tables are structurally identical apart from the path column
//! name (`image_path` vs `video_path`), so the queries are built from a
//! shared template.

use sqlx::PgPool;
use steadydancer_core::types::EntityId;

use crate::models::asset::{MotionAsset, NewAsset, ReferenceAsset};

const REF_COLUMNS: &str = "id, project_id, name, image_path, meta, created_at, updated_at";
const MOTION_COLUMNS: &str = "id, project_id, name, video_path, meta, created_at, updated_at";

/// Provides ingestion and lookup for project assets.
pub struct AssetRepo;

impl AssetRepo {
    /// Insert a new reference asset, returning the created row.
    pub async fn create_reference(
        pool: &PgPool,
        input: &NewAsset,
    ) -> Result<ReferenceAsset, sqlx::Error> {
        let query = format!(
            "INSERT INTO reference_assets (id, project_id, name, image_path, meta)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {REF_COLUMNS}"
        );
        sqlx::query_as::<_, ReferenceAsset>(&query)
            .bind(input.id)
            .bind(input.project_id)
            .bind(&input.name)
            .bind(&input.source_path)
            .bind(&input.meta)
            .fetch_one(pool)
            .await
    }

    /// Find a reference asset scoped to a project.
    pub async fn find_reference_in_project(
        pool: &PgPool,
        project_id: EntityId,
        asset_id: EntityId,
    ) -> Result<Option<ReferenceAsset>, sqlx::Error> {
        let query =
            format!("SELECT {REF_COLUMNS} FROM reference_assets WHERE id = $1 AND project_id = $2");
        sqlx::query_as::<_, ReferenceAsset>(&query)
            .bind(asset_id)
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }

    /// List a project's reference assets, newest first.
    pub async fn list_references(
        pool: &PgPool,
        project_id: EntityId,
    ) -> Result<Vec<ReferenceAsset>, sqlx::Error> {
        let query = format!(
            "SELECT {REF_COLUMNS} FROM reference_assets
             WHERE project_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, ReferenceAsset>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Insert a new motion asset, returning the created row.
    pub async fn create_motion(
        pool: &PgPool,
        input: &NewAsset,
    ) -> Result<MotionAsset, sqlx::Error> {
        let query = format!(
            "INSERT INTO motion_assets (id, project_id, name, video_path, meta)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {MOTION_COLUMNS}"
        );
        sqlx::query_as::<_, MotionAsset>(&query)
            .bind(input.id)
            .bind(input.project_id)
            .bind(&input.name)
            .bind(&input.source_path)
            .bind(&input.meta)
            .fetch_one(pool)
            .await
    }

    /// Find a motion asset scoped to a project.
    pub async fn find_motion_in_project(
        pool: &PgPool,
        project_id: EntityId,
        asset_id: EntityId,
    ) -> Result<Option<MotionAsset>, sqlx::Error> {
        let query =
            format!("SELECT {MOTION_COLUMNS} FROM motion_assets WHERE id = $1 AND project_id = $2");
        sqlx::query_as::<_, MotionAsset>(&query)
            .bind(asset_id)
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }

    /// List a project's motion assets, newest first.
    pub async fn list_motions(
        pool: &PgPool,
        project_id: EntityId,
    ) -> Result<Vec<MotionAsset>, sqlx::Error> {
        let query = format!(
            "SELECT {MOTION_COLUMNS} FROM motion_assets
             WHERE project_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, MotionAsset>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }
}
