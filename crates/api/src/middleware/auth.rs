//! Shared-secret header authentication.
//!
//! A single API key configured via `STEADYDANCER_API_KEY` protects the
//! business routes. When the variable is unset, authentication is
//! disabled (local development). There are no users or roles.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Middleware guard for the `X-API-Key` header.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config.api_key.as_deref() else {
        // Auth disabled when no key is configured.
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if provided != Some(expected) {
        return Err(AppError::InvalidApiKey);
    }

    Ok(next.run(request).await)
}
