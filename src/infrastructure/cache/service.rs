//! Cache service trait and error types.

use async_trait::async_trait;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    Connection(String),
    #[error("Cache operation error: {0}")]
    Operation(String),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Fast shared store for URL mappings, view counters and verification codes.
///
/// The cache is an accelerator, never the source of truth: a missing mapping
/// means "unknown", not "deleted". View counters are the exception in that they
/// hold increments not yet persisted, so they carry no TTL and are only reduced
/// by the view aggregator.
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::RedisCache`] - Redis-backed, shared across instances
/// - [`crate::infrastructure::cache::MemoryCache`] - In-process, for single-node and tests
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Stores `short_code -> original_url` with the configured mapping TTL.
    ///
    /// Overwrites any previous mapping.
    async fn set_url(&self, short_code: &str, original_url: &str) -> CacheResult<()>;

    /// Looks up a cached mapping.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(url))` on hit
    /// - `Ok(None)` on miss or expired entry
    async fn get_url(&self, short_code: &str) -> CacheResult<Option<String>>;

    /// Removes a cached mapping. Succeeds when nothing is cached.
    async fn del_url(&self, short_code: &str) -> CacheResult<()>;

    /// Atomically increments the view counter for `short_code` by one.
    ///
    /// Must never be implemented as read-then-write.
    async fn incr_views(&self, short_code: &str) -> CacheResult<()>;

    /// Returns the pending view count, `0` when no counter exists.
    async fn get_views(&self, short_code: &str) -> CacheResult<i64>;

    /// Removes the view counter. Succeeds when no counter exists.
    async fn del_views(&self, short_code: &str) -> CacheResult<()>;

    /// Atomically subtracts `delta` views that were already persisted.
    ///
    /// The counter is removed once it drops to zero or below, so increments
    /// that arrived after the counter was read are preserved.
    ///
    /// # Returns
    ///
    /// The remaining pending count (`0` when the counter was removed).
    async fn settle_views(&self, short_code: &str, delta: i64) -> CacheResult<i64>;

    /// Iterates over short codes that currently have a view counter.
    ///
    /// Pass `0` to start a sweep and the returned cursor to continue it. A
    /// returned cursor of `0` ends the sweep. Iteration is stateless and makes
    /// no snapshot guarantee: counters created during a sweep may or may not be
    /// returned, and a code may be returned more than once.
    async fn scan_views(&self, cursor: u64, batch_size: usize) -> CacheResult<(Vec<String>, u64)>;

    /// Stores a short-lived verification code for `subject` (e.g. an email).
    ///
    /// Uses the verification TTL, which is configured separately from the
    /// URL mapping TTL.
    async fn set_verification_code(&self, subject: &str, code: &str) -> CacheResult<()>;

    /// Returns the pending verification code for `subject`, if any.
    async fn get_verification_code(&self, subject: &str) -> CacheResult<Option<String>>;

    /// Removes a verification code once it has been consumed.
    async fn del_verification_code(&self, subject: &str) -> CacheResult<()>;

    /// Drops URL mappings and verification codes whose TTL has run out.
    ///
    /// Backends that expire keys on their own return `0`.
    ///
    /// # Returns
    ///
    /// The number of entries removed.
    async fn purge_expired(&self) -> CacheResult<usize>;

    /// Checks if the cache backend is healthy.
    ///
    /// Used by the health endpoint to report cache status.
    async fn health_check(&self) -> bool;
}
