//! Reference and motion asset models.
//!
//! Assets are immutable after ingestion: the source file is copied into
//! the asset's own `source/` directory exactly once and the row is never
//! updated afterwards. They go away only through the project cascade.

use serde::Serialize;
use sqlx::FromRow;
use steadydancer_core::types::{EntityId, Timestamp};

/// A row from the `reference_assets` table (still image).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReferenceAsset {
    pub id: EntityId,
    pub project_id: EntityId,
    pub name: String,
    /// Absolute path of the ingested copy under the asset's `source/`.
    pub image_path: String,
    pub meta: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `motion_assets` table (driving video).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MotionAsset {
    pub id: EntityId,
    pub project_id: EntityId,
    pub name: String,
    /// Absolute path of the ingested copy under the asset's `source/`.
    pub video_path: String,
    pub meta: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Insert payload for either asset kind. The id is allocated by the
/// caller because the on-disk directory is created before the row.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub id: EntityId,
    pub project_id: EntityId,
    pub name: String,
    /// Final stored path (`image_path` or `video_path` depending on kind).
    pub source_path: String,
    pub meta: Option<serde_json::Value>,
}
