//! API route configuration.
//!
//! All API endpoints require Bearer token authentication via
//! [`crate::api::middleware::auth`].

use crate::api::handlers::{
    create_url_handler, delete_url_handler, list_urls_handler, update_url_handler,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, patch},
};

/// All API routes, protected by Bearer token authentication.
///
/// # Endpoints
///
/// - `POST   /urls`          - Create a short URL
/// - `GET    /urls`          - List the caller's short URLs (paginated)
/// - `PATCH  /urls/{code}`   - Change the expiry of a short URL
/// - `DELETE /urls/{code}`   - Delete a short URL
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/urls", get(list_urls_handler).post(create_url_handler))
        .route(
            "/urls/{code}",
            patch(update_url_handler).delete(delete_url_handler),
        )
}
