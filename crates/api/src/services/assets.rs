//! Asset ingestion.
//!
//! An asset is created by copying a user-supplied file into the asset's
//! own `source/` directory. The copy happens after the source path has
//! resolved, so a bad path aborts before any row is written. Assets are
//! immutable afterwards.

use serde::Deserialize;
use steadydancer_core::layout::{self, AssetPaths};
use steadydancer_core::types::EntityId;
use steadydancer_db::models::asset::{MotionAsset, NewAsset, ReferenceAsset};
use steadydancer_db::repositories::AssetRepo;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::projects;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateReferenceAsset {
    pub name: String,
    /// Path to the source reference image (absolute or repo-root-relative).
    pub source_image_path: String,
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMotionAsset {
    pub name: String,
    /// Path to the source driving video (absolute or repo-root-relative).
    pub source_video_path: String,
    pub meta: Option<serde_json::Value>,
}

pub async fn create_reference_asset(
    state: &AppState,
    project_id: EntityId,
    input: CreateReferenceAsset,
) -> AppResult<ReferenceAsset> {
    projects::get_project(state, project_id).await?;

    let source = state.resolver.resolve_file(&input.source_image_path)?;

    let ref_id = Uuid::new_v4();
    let paths = state.layout.ensure_reference_dirs(project_id, ref_id)?;
    let dest = layout::copy_file_into(&source, &paths.source_dir)?;
    write_meta_snapshot(&paths, input.meta.as_ref());

    let asset = AssetRepo::create_reference(
        &state.pool,
        &NewAsset {
            id: ref_id,
            project_id,
            name: input.name,
            source_path: dest.display().to_string(),
            meta: input.meta,
        },
    )
    .await?;

    tracing::info!(project_id = %project_id, asset_id = %asset.id, "Reference asset ingested");
    Ok(asset)
}

pub async fn create_motion_asset(
    state: &AppState,
    project_id: EntityId,
    input: CreateMotionAsset,
) -> AppResult<MotionAsset> {
    projects::get_project(state, project_id).await?;

    let source = state.resolver.resolve_file(&input.source_video_path)?;

    let motion_id = Uuid::new_v4();
    let paths = state.layout.ensure_motion_dirs(project_id, motion_id)?;
    let dest = layout::copy_file_into(&source, &paths.source_dir)?;
    write_meta_snapshot(&paths, input.meta.as_ref());

    let asset = AssetRepo::create_motion(
        &state.pool,
        &NewAsset {
            id: motion_id,
            project_id,
            name: input.name,
            source_path: dest.display().to_string(),
            meta: input.meta,
        },
    )
    .await?;

    tracing::info!(project_id = %project_id, asset_id = %asset.id, "Motion asset ingested");
    Ok(asset)
}

/// Mirror the meta document to `meta.json` next to the source copy.
/// Best-effort; a write failure never fails the request.
fn write_meta_snapshot(paths: &AssetPaths, meta: Option<&serde_json::Value>) {
    let Some(meta) = meta else { return };
    match serde_json::to_vec_pretty(meta) {
        Ok(bytes) => {
            if let Err(e) = std::fs::write(&paths.meta_path, bytes) {
                tracing::warn!(error = %e, path = %paths.meta_path.display(), "Failed to write meta.json");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to serialize asset meta"),
    }
}
