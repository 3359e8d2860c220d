//! Handlers for short URL management (create, list, update, delete).

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::api::dto::pagination::PaginationParams;
use crate::api::dto::urls::{
    CreateUrlRequest, CreateUrlResponse, UpdateUrlRequest, UrlItem, UrlListResponse,
};
use crate::application::services::CreateUrl;
use crate::domain::entities::Owner;
use crate::error::AppError;
use crate::state::AppState;

/// Creates a short URL owned by the caller.
///
/// # Endpoint
///
/// `POST /api/urls`
///
/// # Request Body
///
/// ```json
/// {
///   "original_url": "https://example.com/some/long/path",
///   "custom_code": "promo1",   // optional, 4-10 letters or digits
///   "duration": 48             // optional, hours (1-100)
/// }
/// ```
///
/// # Response
///
/// `201 Created`
///
/// ```json
/// {
///   "short_url": "https://s.example.com/promo1",
///   "code": "promo1",
///   "expires_at": "2026-01-03T12:00:00Z"
/// }
/// ```
///
/// # Errors
///
/// - 400 Bad Request if validation fails
/// - 409 Conflict if the custom code is taken
/// - 503 Service Unavailable if no free code could be generated
pub async fn create_url_handler(
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
    Json(payload): Json<CreateUrlRequest>,
) -> Result<(StatusCode, Json<CreateUrlResponse>), AppError> {
    payload.validate()?;

    let created = state
        .url_service
        .create_url(CreateUrl {
            original_url: payload.original_url,
            custom_code: payload.custom_code,
            duration_hours: payload.duration,
            owner: Some(owner),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Lists the caller's short URLs, oldest first.
///
/// # Endpoint
///
/// `GET /api/urls?page=1&size=10`
///
/// # Query Parameters
///
/// - `page` (optional): Page number (default: 1)
/// - `size` (optional): Items per page (default: 10, max: 100)
///
/// `views` on each item includes visits not yet flushed to the database.
///
/// # Errors
///
/// Returns 400 Bad Request if pagination parameters are invalid.
pub async fn list_urls_handler(
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<UrlListResponse>, AppError> {
    let (page, size) = params.resolve()?;

    let page = state.url_service.get_urls(owner, page, size).await?;

    let items = page
        .items
        .into_iter()
        .map(|item| {
            let short_url = state.url_service.short_url(&item.url.short_code);
            UrlItem::new(item, short_url)
        })
        .collect();

    Ok(Json(UrlListResponse {
        items,
        total: page.total,
    }))
}

/// Replaces the expiry of one of the caller's short URLs.
///
/// # Endpoint
///
/// `PATCH /api/urls/{code}`
///
/// ```json
/// { "expires_at": "2026-12-31T23:59:59Z" }
/// ```
///
/// A cached redirect may keep working until its cache TTL runs out.
///
/// # Errors
///
/// - 400 Bad Request if `expires_at` is not in the future
/// - 404 Not Found if the code doesn't exist or belongs to another owner
pub async fn update_url_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
    Json(payload): Json<UpdateUrlRequest>,
) -> Result<StatusCode, AppError> {
    if payload.expires_at <= Utc::now() {
        return Err(AppError::bad_request(
            "expires_at must be in the future",
            json!({ "expires_at": payload.expires_at }),
        ));
    }

    state.url_service.ensure_owner(&code, owner).await?;
    state
        .url_service
        .update_url_duration(&code, payload.expires_at)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Deletes one of the caller's short URLs with its cached state.
///
/// # Endpoint
///
/// `DELETE /api/urls/{code}`
///
/// # Errors
///
/// - 404 Not Found if the code doesn't exist or belongs to another owner
/// - 500 Internal Server Error if cache cleanup fails; repeating the request
///   finishes the cleanup and then answers 404
pub async fn delete_url_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
    Extension(owner): Extension<Owner>,
) -> Result<StatusCode, AppError> {
    state.url_service.delete_owned_url(&code, owner).await?;

    Ok(StatusCode::NO_CONTENT)
}
