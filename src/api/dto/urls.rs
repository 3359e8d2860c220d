//! DTOs for short URL management endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::application::services::CreatedUrl;
use crate::domain::entities::ShortUrlWithViews;

/// Request to create a short URL.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUrlRequest {
    /// The URL to shorten (HTTP/HTTPS, normalized before storage).
    #[validate(url(message = "Invalid URL format"))]
    pub original_url: String,

    /// Optional caller-chosen code, 4 to 10 ASCII letters or digits.
    pub custom_code: Option<String>,

    /// Lifetime in hours; the server default applies when absent.
    #[validate(range(min = 1, max = 100, message = "Duration must be 1 to 100 hours"))]
    pub duration: Option<i64>,
}

/// Response for a created short URL.
#[derive(Debug, Serialize)]
pub struct CreateUrlResponse {
    pub short_url: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl From<CreatedUrl> for CreateUrlResponse {
    fn from(created: CreatedUrl) -> Self {
        Self {
            short_url: created.short_url,
            code: created.record.short_code,
            expires_at: created.record.expires_at,
        }
    }
}

/// One row of the owner's URL list.
#[derive(Debug, Serialize)]
pub struct UrlItem {
    pub code: String,
    pub short_url: String,
    pub original_url: String,
    pub is_custom: bool,
    pub views: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl UrlItem {
    pub fn new(item: ShortUrlWithViews, short_url: String) -> Self {
        let ShortUrlWithViews { url, views } = item;
        Self {
            code: url.short_code,
            short_url,
            original_url: url.original_url,
            is_custom: url.is_custom,
            views,
            expires_at: url.expires_at,
            created_at: url.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UrlListResponse {
    pub items: Vec<UrlItem>,
    pub total: i64,
}

/// Request to change the expiry of a short URL.
#[derive(Debug, Deserialize)]
pub struct UpdateUrlRequest {
    pub expires_at: DateTime<Utc>,
}
