//! Repository trait for short URL records.

use crate::domain::entities::{NewShortUrl, ShortUrl};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable store of short URL records.
///
/// The uniqueness constraint on `short_code` is the source of truth for code
/// allocation; [`ShortUrlRepository::is_code_available`] is an optimisation
/// that may race with concurrent creates.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgShortUrlRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::MemoryShortUrlRepository`] - In-memory implementation
/// - Test mocks available with `cfg(test)`
///
/// # Examples
///
/// See integration tests: `tests/repository_short_url.rs`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShortUrlRepository: Send + Sync {
    /// Persists a new record.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the short code already exists.
    /// Returns [`AppError::Internal`] on database errors.
    async fn create(&self, new_url: NewShortUrl) -> Result<ShortUrl, AppError>;

    /// Returns true when no record uses `code`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn is_code_available(&self, code: &str) -> Result<bool, AppError>;

    /// Finds a record by short code, expired or not.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_code(&self, code: &str) -> Result<Option<ShortUrl>, AppError>;

    /// Deletes a record. Returns `Ok(false)` when nothing matched.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn delete_by_code(&self, code: &str) -> Result<bool, AppError>;

    /// Replaces the expiry of a record. Returns `Ok(false)` when nothing matched.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn update_expiry_by_code(
        &self,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Adds `delta` to the cumulative `view_count`.
    ///
    /// A missing record is not an error: the counter of a deleted URL is
    /// simply discarded.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn add_views(&self, code: &str, delta: i64) -> Result<(), AppError>;

    /// Lists an owner's records ordered by creation, oldest first.
    ///
    /// # Returns
    ///
    /// The requested page and the owner's total number of records.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn list_by_owner(
        &self,
        owner_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ShortUrl>, i64), AppError>;

    /// Checks that the store answers queries.
    async fn health_check(&self) -> bool;
}
