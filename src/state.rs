//! Shared state injected into every handler.

use std::sync::Arc;

use crate::application::services::{AuthService, SyncStatus, UrlService};
use crate::domain::repositories::ShortUrlRepository;
use crate::infrastructure::cache::CacheService;

/// Application state, cloned per request.
///
/// All fields are reference-counted, so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub url_service: Arc<UrlService>,
    pub auth_service: Arc<AuthService>,
    /// Used by the health check.
    pub repository: Arc<dyn ShortUrlRepository>,
    /// Used by the health check.
    pub cache: Arc<dyn CacheService>,
    /// Progress of the background view aggregator.
    pub sync_status: Arc<SyncStatus>,
}
