use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use steadydancer_core::error::CoreError;
use steadydancer_queue::QueueError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce the `{code, message, extra?}`
/// JSON error body used by every endpoint.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `steadydancer_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A task queue transport error.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Missing or wrong `X-API-Key` header.
    #[error("Invalid or missing API key")]
    InvalidApiKey,

    /// A 404 with a human-readable message (no entity id available).
    #[error("Not found: {0}")]
    NotFoundMessage(String),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalError(format!("JSON serialization failed: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, extra) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} not found: {id}"),
                    None,
                ),
                CoreError::SourceNotFound { path } => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_INPUT",
                    format!("Source path not found: {}", path.display()),
                    Some(json!({ "path": path.display().to_string() })),
                ),
                CoreError::InvalidInput(msg) => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_INPUT",
                    msg.clone(),
                    None,
                ),
                CoreError::Conflict(msg) => {
                    (StatusCode::CONFLICT, "CONFLICT", msg.clone(), None)
                }
                CoreError::UpstreamTask {
                    task_id,
                    state,
                    detail,
                } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "UPSTREAM_TASK_ERROR",
                    "Task queue reported an error".to_string(),
                    Some(json!({ "task_id": task_id, "state": state, "error": detail })),
                ),
                CoreError::Io { .. } | CoreError::Internal(_) => {
                    tracing::error!(error = %core, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                        None,
                    )
                }
            },

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- Queue transport errors ---
            AppError::Queue(err) => {
                tracing::error!(error = %err, "Task queue error");
                (
                    StatusCode::BAD_GATEWAY,
                    "QUEUE_UNAVAILABLE",
                    "Task queue is unavailable".to_string(),
                    None,
                )
            }

            // --- HTTP-specific errors ---
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "INVALID_API_KEY",
                "Invalid or missing API key.".to_string(),
                None,
            ),
            AppError::NotFoundMessage(msg) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None)
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone(), None)
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({
            "code": code,
            "message": message,
        });
        if let Some(extra) = extra {
            body["extra"] = extra;
        }

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a sqlx error into status, code, message, and extra payload.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`)
///   map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(
    err: &sqlx::Error,
) -> (StatusCode, &'static str, String, Option<serde_json::Value>) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
            None,
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                        None,
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            )
        }
    }
}
