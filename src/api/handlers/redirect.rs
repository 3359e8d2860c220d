//! Handler for short URL redirect.

use axum::{
    extract::{Path, State},
    response::Redirect,
};
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;

/// Redirects a short code to its original URL.
///
/// # Endpoint
///
/// `GET /{code}`
///
/// # Request Flow
///
/// 1. Resolve the code through the cache, falling back to the database
/// 2. Count the visit on a background task (never awaited)
/// 3. Return 307 Temporary Redirect
///
/// A temporary redirect keeps browsers from caching the target, so every
/// visit reaches the counter.
///
/// # Errors
///
/// Returns 404 Not Found if the short code doesn't exist or has expired.
pub async fn redirect_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let original_url = state.url_service.get_url(&code).await?;

    debug!(code = %code, "Redirecting");
    state.url_service.incr_views(&code);

    Ok(Redirect::temporary(&original_url))
}
