//! Short URL record, the durable mapping from a short code to its target.

use chrono::{DateTime, Utc};

/// A persisted short URL.
///
/// `short_code` is globally unique. `view_count` is the durable cumulative
/// number of visits; visits not yet flushed from the cache are not included.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortUrl {
    pub id: i64,
    pub original_url: String,
    pub short_code: String,
    pub is_custom: bool,
    pub expires_at: DateTime<Utc>,
    pub owner_id: Option<i64>,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
}

impl ShortUrl {
    /// Returns true once `expires_at` has passed.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Input data for creating a new short URL.
#[derive(Debug, Clone, PartialEq)]
pub struct NewShortUrl {
    pub original_url: String,
    pub short_code: String,
    pub is_custom: bool,
    pub expires_at: DateTime<Utc>,
    pub owner_id: Option<i64>,
}

/// A short URL together with its pending (not yet flushed) views.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortUrlWithViews {
    pub url: ShortUrl,
    /// Persisted `view_count` plus the current cache counter.
    pub views: i64,
}
