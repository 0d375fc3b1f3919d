//! Handlers for reference and motion assets.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use steadydancer_core::error::CoreError;
use steadydancer_core::types::EntityId;
use steadydancer_db::repositories::AssetRepo;

use crate::error::{AppError, AppResult};
use crate::services;
use crate::services::assets::{CreateMotionAsset, CreateReferenceAsset};
use crate::state::AppState;

/// POST /projects/{id}/refs
///
/// Ingest a reference image: the source file is copied into the asset's
/// `source/` directory.
pub async fn create_reference_asset(
    State(state): State<AppState>,
    Path(project_id): Path<EntityId>,
    Json(input): Json<CreateReferenceAsset>,
) -> AppResult<impl IntoResponse> {
    let asset = services::assets::create_reference_asset(&state, project_id, input).await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

/// GET /projects/{id}/refs
pub async fn list_reference_assets(
    State(state): State<AppState>,
    Path(project_id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    services::projects::get_project(&state, project_id).await?;
    let assets = AssetRepo::list_references(&state.pool, project_id).await?;
    Ok(Json(assets))
}

/// GET /projects/{id}/refs/{rid}
pub async fn get_reference_asset(
    State(state): State<AppState>,
    Path((project_id, ref_id)): Path<(EntityId, EntityId)>,
) -> AppResult<impl IntoResponse> {
    let asset = AssetRepo::find_reference_in_project(&state.pool, project_id, ref_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "ReferenceAsset",
            id: ref_id,
        }))?;
    Ok(Json(asset))
}

/// POST /projects/{id}/motions
///
/// Ingest a motion (driving video) asset.
pub async fn create_motion_asset(
    State(state): State<AppState>,
    Path(project_id): Path<EntityId>,
    Json(input): Json<CreateMotionAsset>,
) -> AppResult<impl IntoResponse> {
    let asset = services::assets::create_motion_asset(&state, project_id, input).await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

/// GET /projects/{id}/motions
pub async fn list_motion_assets(
    State(state): State<AppState>,
    Path(project_id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    services::projects::get_project(&state, project_id).await?;
    let assets = AssetRepo::list_motions(&state.pool, project_id).await?;
    Ok(Json(assets))
}

/// GET /projects/{id}/motions/{mid}
pub async fn get_motion_asset(
    State(state): State<AppState>,
    Path((project_id, motion_id)): Path<(EntityId, EntityId)>,
) -> AppResult<impl IntoResponse> {
    let asset = AssetRepo::find_motion_in_project(&state.pool, project_id, motion_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "MotionAsset",
            id: motion_id,
        }))?;
    Ok(Json(asset))
}
