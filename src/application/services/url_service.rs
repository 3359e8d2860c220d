//! Short URL lifecycle: allocation, cache-aside resolution, listing and removal.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::services::ViewAggregator;
use crate::domain::entities::{NewShortUrl, Owner, ShortUrl, ShortUrlWithViews};
use crate::domain::repositories::ShortUrlRepository;
use crate::error::AppError;
use crate::infrastructure::cache::CacheService;
use crate::utils::code_generator::{CodeGenerator, validate_custom_code};
use crate::utils::url_normalizer::normalize_url;

/// Generated candidates tried before giving up on a create.
pub const MAX_ATTEMPTS: usize = 5;

/// Input for [`UrlService::create_url`].
#[derive(Debug, Clone, Default)]
pub struct CreateUrl {
    pub original_url: String,
    pub custom_code: Option<String>,
    /// Lifetime in hours; the configured default applies when absent.
    pub duration_hours: Option<i64>,
    pub owner: Option<Owner>,
}

/// A freshly created short URL.
#[derive(Debug, Clone)]
pub struct CreatedUrl {
    /// `base_url + "/" + short_code`
    pub short_url: String,
    pub record: ShortUrl,
}

/// One page of an owner's short URLs.
#[derive(Debug, Clone)]
pub struct UrlPage {
    pub items: Vec<ShortUrlWithViews>,
    /// Total number of records the owner has, across all pages.
    pub total: i64,
}

/// Orchestrates the code generator, the cache and the store.
///
/// Holds no mutable state of its own, so one instance is shared by every
/// request handler. Correctness under concurrency rests on the store's
/// uniqueness constraint and the cache's atomic counters.
pub struct UrlService {
    repository: Arc<dyn ShortUrlRepository>,
    cache: Arc<dyn CacheService>,
    generator: Arc<dyn CodeGenerator>,
    base_url: String,
    default_duration: Duration,
}

impl UrlService {
    /// Creates a new URL service.
    ///
    /// # Arguments
    ///
    /// - `base_url` - Public origin of short links; a trailing slash is dropped
    /// - `default_duration` - Lifetime of URLs created without an explicit duration
    pub fn new(
        repository: Arc<dyn ShortUrlRepository>,
        cache: Arc<dyn CacheService>,
        generator: Arc<dyn CodeGenerator>,
        base_url: impl Into<String>,
        default_duration: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            repository,
            cache,
            generator,
            base_url,
            default_duration,
        }
    }

    /// Composes the public short URL for a code.
    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.base_url, code)
    }

    /// Builds the aggregator that drains this service's view counters.
    ///
    /// Only one aggregator may run per deployment.
    pub fn view_aggregator(&self) -> ViewAggregator {
        ViewAggregator::new(Arc::clone(&self.repository), Arc::clone(&self.cache))
    }

    /// Creates a short URL and writes it through to the cache.
    ///
    /// A custom code is used as given once it passes validation and is free.
    /// Otherwise up to [`MAX_ATTEMPTS`] generated candidates are checked and the
    /// first free one is taken. The availability check is only a pre-check; a
    /// concurrent create of the same code is caught by the store.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] for a malformed URL, custom code or duration
    /// - [`AppError::Conflict`] if the custom code is taken, or the store
    ///   rejects the code on insert
    /// - [`AppError::RetriesExhausted`] if every generated candidate was taken
    /// - [`AppError::Internal`] if the store or the cache fails
    pub async fn create_url(&self, request: CreateUrl) -> Result<CreatedUrl, AppError> {
        let original_url = normalize_url(&request.original_url).map_err(|e| {
            AppError::bad_request("Invalid URL format", json!({ "reason": e.to_string() }))
        })?;

        let (short_code, is_custom) = match request.custom_code {
            Some(custom) => {
                validate_custom_code(&custom)?;

                if !self.repository.is_code_available(&custom).await? {
                    return Err(AppError::conflict(
                        "Custom code already exists",
                        json!({ "code": custom }),
                    ));
                }

                (custom, true)
            }
            None => (self.allocate_code().await?, false),
        };

        let lifetime = match request.duration_hours {
            Some(hours) if hours <= 0 => {
                return Err(AppError::bad_request(
                    "Duration must be a positive number of hours",
                    json!({ "duration": hours }),
                ));
            }
            Some(hours) => Duration::hours(hours),
            None => self.default_duration,
        };

        let record = self
            .repository
            .create(NewShortUrl {
                original_url,
                short_code,
                is_custom,
                expires_at: Utc::now() + lifetime,
                owner_id: request.owner.map(Owner::id),
            })
            .await?;

        self.cache
            .set_url(&record.short_code, &record.original_url)
            .await?;

        info!(
            code = %record.short_code,
            custom = record.is_custom,
            expires_at = %record.expires_at,
            "Short URL created"
        );

        Ok(CreatedUrl {
            short_url: self.short_url(&record.short_code),
            record,
        })
    }

    async fn allocate_code(&self) -> Result<String, AppError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let candidate = self.generator.generate();

            if self.repository.is_code_available(&candidate).await? {
                return Ok(candidate);
            }

            debug!(attempt, code = %candidate, "Generated code already taken");
        }

        warn!(attempts = MAX_ATTEMPTS, "Short code allocation exhausted");
        metrics::counter!("short_code_retries_exhausted_total").increment(1);

        Err(AppError::retries_exhausted(
            "Could not allocate a unique short code",
            json!({ "attempts": MAX_ATTEMPTS }),
        ))
    }

    /// Resolves a short code to its original URL, cache first.
    ///
    /// A hit never touches the store. On a miss the record is read from the
    /// store and written back to the cache. A failing cache degrades to the
    /// store; a failing backfill is logged and does not fail the lookup.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotFound`] if no record exists or it has expired
    /// - [`AppError::Internal`] if the store fails
    pub async fn get_url(&self, code: &str) -> Result<String, AppError> {
        match self.cache.get_url(code).await {
            Ok(Some(url)) => {
                metrics::counter!("cache_hits_total").increment(1);
                return Ok(url);
            }
            Ok(None) => metrics::counter!("cache_misses_total").increment(1),
            Err(e) => warn!(code, error = %e, "Cache read failed, falling back to store"),
        }

        let record = self
            .repository
            .find_by_code(code)
            .await?
            .filter(|r| !r.is_expired())
            .ok_or_else(|| AppError::not_found("Short URL not found", json!({ "code": code })))?;

        if let Err(e) = self.cache.set_url(code, &record.original_url).await {
            warn!(code, error = %e, "Cache backfill failed");
        }

        Ok(record.original_url)
    }

    /// Counts one visit without blocking the caller.
    ///
    /// The increment runs on a spawned task. Failures are logged and never
    /// retried; an increment still queued when the runtime shuts down is lost.
    /// The returned handle may be dropped.
    pub fn incr_views(&self, code: &str) -> JoinHandle<()> {
        let cache = Arc::clone(&self.cache);
        let code = code.to_string();

        tokio::spawn(async move {
            if let Err(e) = cache.incr_views(&code).await {
                metrics::counter!("view_increments_dropped_total").increment(1);
                warn!(code = %code, error = %e, "Failed to count view");
            }
        })
    }

    /// Lists an owner's short URLs, oldest first.
    ///
    /// Each item's `views` is the persisted count plus the visits still
    /// pending in the cache.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] if `page` or `size` is below 1
    /// - [`AppError::Internal`] if the store or the cache fails
    pub async fn get_urls(&self, owner: Owner, page: i64, size: i64) -> Result<UrlPage, AppError> {
        if page < 1 || size < 1 {
            return Err(AppError::bad_request(
                "Page and size must be at least 1",
                json!({ "page": page, "size": size }),
            ));
        }

        let offset = (page - 1).saturating_mul(size);
        let (records, total) = self
            .repository
            .list_by_owner(owner.id(), size, offset)
            .await?;

        let mut items = Vec::with_capacity(records.len());
        for url in records {
            let pending = self.cache.get_views(&url.short_code).await?;
            items.push(ShortUrlWithViews {
                views: url.view_count + pending,
                url,
            });
        }

        Ok(UrlPage { items, total })
    }

    /// Loads a record and checks that `owner` may manage it.
    ///
    /// A record owned by someone else is reported exactly like a missing one.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotFound`] if the record is missing or not owned by `owner`
    /// - [`AppError::Internal`] if the store fails
    pub async fn ensure_owner(&self, code: &str, owner: Owner) -> Result<ShortUrl, AppError> {
        self.repository
            .find_by_code(code)
            .await?
            .filter(|r| r.owner_id == Some(owner.id()))
            .ok_or_else(|| AppError::not_found("Short URL not found", json!({ "code": code })))
    }

    /// Deletes a record, its cached mapping and its pending views.
    ///
    /// The cache cleanup runs even when the store has no record, so retrying
    /// after a failed cleanup still clears the mapping and the counter.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotFound`] if no record existed
    /// - [`AppError::Internal`] if the store or the cache fails
    pub async fn delete_url(&self, code: &str) -> Result<(), AppError> {
        let deleted = self.repository.delete_by_code(code).await?;

        self.cache.del_url(code).await?;
        self.cache.del_views(code).await?;

        if !deleted {
            return Err(AppError::not_found(
                "Short URL not found",
                json!({ "code": code }),
            ));
        }

        info!(code, "Short URL deleted");
        Ok(())
    }

    /// Deletes a record on behalf of `owner`.
    ///
    /// A code with no record left is still passed to [`Self::delete_url`] so
    /// leftover cache state from an earlier failed delete gets cleared. A
    /// record owned by someone else is left untouched.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotFound`] if the record is missing or not owned by `owner`
    /// - [`AppError::Internal`] if the store or the cache fails
    pub async fn delete_owned_url(&self, code: &str, owner: Owner) -> Result<(), AppError> {
        if let Some(record) = self.repository.find_by_code(code).await?
            && record.owner_id != Some(owner.id())
        {
            return Err(AppError::not_found(
                "Short URL not found",
                json!({ "code": code }),
            ));
        }

        self.delete_url(code).await
    }

    /// Replaces the expiry of a record.
    ///
    /// The cached mapping is left alone, so a shortened lifetime may keep
    /// resolving from the cache for up to one cache TTL.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotFound`] if no record exists
    /// - [`AppError::Internal`] if the store fails
    pub async fn update_url_duration(
        &self,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if !self
            .repository
            .update_expiry_by_code(code, expires_at)
            .await?
        {
            return Err(AppError::not_found(
                "Short URL not found",
                json!({ "code": code }),
            ));
        }

        info!(code, expires_at = %expires_at, "Short URL expiry updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockShortUrlRepository;
    use crate::infrastructure::cache::{CacheError, MemoryCache, MockCacheService};
    use crate::infrastructure::persistence::MemoryShortUrlRepository;
    use crate::utils::code_generator::{MockCodeGenerator, RandomCodeGenerator};

    const BASE: &str = "https://sho.rt";

    fn service_with(
        repository: Arc<dyn ShortUrlRepository>,
        cache: Arc<dyn CacheService>,
        generator: Arc<dyn CodeGenerator>,
    ) -> UrlService {
        UrlService::new(repository, cache, generator, BASE, Duration::hours(720))
    }

    fn memory_service() -> (UrlService, Arc<MemoryShortUrlRepository>, Arc<MemoryCache>) {
        let repository = Arc::new(MemoryShortUrlRepository::new());
        let cache = Arc::new(MemoryCache::default());
        let service = service_with(
            repository.clone(),
            cache.clone(),
            Arc::new(RandomCodeGenerator::default()),
        );
        (service, repository, cache)
    }

    fn request(custom_code: Option<&str>) -> CreateUrl {
        CreateUrl {
            original_url: "https://example.com/page".to_string(),
            custom_code: custom_code.map(str::to_string),
            duration_hours: None,
            owner: Some(Owner(1)),
        }
    }

    fn record(code: &str, expires_at: DateTime<Utc>) -> ShortUrl {
        ShortUrl {
            id: 1,
            original_url: "https://example.com/".to_string(),
            short_code: code.to_string(),
            is_custom: false,
            expires_at,
            owner_id: Some(1),
            view_count: 0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_generated_code() {
        let (service, repository, cache) = memory_service();

        let created = service.create_url(request(None)).await.unwrap();

        assert_eq!(created.record.short_code.len(), 6);
        assert!(!created.record.is_custom);
        assert_eq!(
            created.short_url,
            format!("{BASE}/{}", created.record.short_code)
        );
        assert_eq!(repository.len(), 1);
        assert_eq!(
            cache
                .get_url(&created.record.short_code)
                .await
                .unwrap()
                .as_deref(),
            Some("https://example.com/page")
        );
    }

    #[tokio::test]
    async fn test_create_uses_default_or_given_duration() {
        let (service, _, _) = memory_service();

        let default = service.create_url(request(None)).await.unwrap();
        let remaining = default.record.expires_at - Utc::now();
        assert!(remaining > Duration::hours(719) && remaining <= Duration::hours(720));

        let short = service
            .create_url(CreateUrl {
                duration_hours: Some(2),
                ..request(None)
            })
            .await
            .unwrap();
        let remaining = short.record.expires_at - Utc::now();
        assert!(remaining > Duration::minutes(119) && remaining <= Duration::hours(2));
    }

    #[tokio::test]
    async fn test_create_custom_code_twice_conflicts() {
        let (service, repository, _) = memory_service();

        let first = service.create_url(request(Some("abcd"))).await.unwrap();
        assert!(first.record.is_custom);
        assert_eq!(first.short_url, "https://sho.rt/abcd");

        let err = service.create_url(request(Some("abcd"))).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
        assert_eq!(repository.len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let (service, repository, _) = memory_service();

        let bad_url = CreateUrl {
            original_url: "javascript:alert(1)".to_string(),
            ..request(None)
        };
        assert!(matches!(
            service.create_url(bad_url).await.unwrap_err(),
            AppError::Validation { .. }
        ));

        assert!(matches!(
            service.create_url(request(Some("a-b"))).await.unwrap_err(),
            AppError::Validation { .. }
        ));

        let bad_duration = CreateUrl {
            duration_hours: Some(0),
            ..request(None)
        };
        assert!(matches!(
            service.create_url(bad_duration).await.unwrap_err(),
            AppError::Validation { .. }
        ));

        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn test_create_gives_up_after_five_taken_candidates() {
        let mut generator = MockCodeGenerator::new();
        generator
            .expect_generate()
            .times(MAX_ATTEMPTS)
            .returning(|| "taken1".to_string());

        let mut repository = MockShortUrlRepository::new();
        repository
            .expect_is_code_available()
            .times(MAX_ATTEMPTS)
            .returning(|_| Ok(false));
        repository.expect_create().never();

        let service = service_with(
            Arc::new(repository),
            Arc::new(MemoryCache::default()),
            Arc::new(generator),
        );

        let err = service.create_url(request(None)).await.unwrap_err();
        assert!(matches!(err, AppError::RetriesExhausted { .. }));
    }

    #[tokio::test]
    async fn test_create_takes_first_free_candidate() {
        let mut generator = MockCodeGenerator::new();
        let mut seq = mockall::Sequence::new();
        generator
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| "taken1".to_string());
        generator
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| "free22".to_string());

        let repository = Arc::new(MemoryShortUrlRepository::new());
        repository
            .create(NewShortUrl {
                original_url: "https://other.example/".to_string(),
                short_code: "taken1".to_string(),
                is_custom: false,
                expires_at: Utc::now() + Duration::hours(1),
                owner_id: None,
            })
            .await
            .unwrap();

        let service = service_with(
            repository,
            Arc::new(MemoryCache::default()),
            Arc::new(generator),
        );

        let created = service.create_url(request(None)).await.unwrap();
        assert_eq!(created.record.short_code, "free22");
    }

    #[tokio::test]
    async fn test_create_surfaces_cache_write_failure() {
        let mut cache = MockCacheService::new();
        cache
            .expect_set_url()
            .returning(|_, _| Err(CacheError::Connection("refused".to_string())));

        let service = service_with(
            Arc::new(MemoryShortUrlRepository::new()),
            Arc::new(cache),
            Arc::new(RandomCodeGenerator::default()),
        );

        let err = service.create_url(request(None)).await.unwrap_err();
        assert!(matches!(err, AppError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_get_url_after_create_is_served_from_cache() {
        let cache = Arc::new(MemoryCache::default());
        let mut repository = MockShortUrlRepository::new();
        repository.expect_is_code_available().returning(|_| Ok(true));
        repository.expect_create().times(1).returning(|new_url| {
            Ok(ShortUrl {
                id: 1,
                original_url: new_url.original_url,
                short_code: new_url.short_code,
                is_custom: new_url.is_custom,
                expires_at: new_url.expires_at,
                owner_id: new_url.owner_id,
                view_count: 0,
                created_at: Utc::now(),
            })
        });
        repository.expect_find_by_code().never();

        let service = service_with(
            Arc::new(repository),
            cache,
            Arc::new(RandomCodeGenerator::default()),
        );

        let created = service.create_url(request(Some("abcd"))).await.unwrap();
        let url = service.get_url(&created.record.short_code).await.unwrap();

        assert_eq!(url, "https://example.com/page");
    }

    #[tokio::test]
    async fn test_get_url_miss_backfills_cache() {
        let cache = Arc::new(MemoryCache::default());
        let mut repository = MockShortUrlRepository::new();
        repository
            .expect_find_by_code()
            .times(1)
            .returning(|code| Ok(Some(record(code, Utc::now() + Duration::hours(1)))));

        let service = service_with(
            Arc::new(repository),
            cache.clone(),
            Arc::new(RandomCodeGenerator::default()),
        );

        assert_eq!(service.get_url("abc123").await.unwrap(), "https://example.com/");
        // second lookup must not reach the store (times(1) above)
        assert_eq!(service.get_url("abc123").await.unwrap(), "https://example.com/");
        assert!(cache.get_url("abc123").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_url_unknown_or_expired_is_not_found() {
        let mut repository = MockShortUrlRepository::new();
        repository
            .expect_find_by_code()
            .withf(|code| code == "gone")
            .returning(|_| Ok(None));
        repository
            .expect_find_by_code()
            .withf(|code| code == "old")
            .returning(|code| Ok(Some(record(code, Utc::now() - Duration::seconds(1)))));

        let cache = Arc::new(MemoryCache::default());
        let service = service_with(
            Arc::new(repository),
            cache.clone(),
            Arc::new(RandomCodeGenerator::default()),
        );

        assert!(matches!(
            service.get_url("gone").await.unwrap_err(),
            AppError::NotFound { .. }
        ));
        assert!(matches!(
            service.get_url("old").await.unwrap_err(),
            AppError::NotFound { .. }
        ));
        assert!(cache.get_url("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_url_falls_back_when_cache_is_down() {
        let mut cache = MockCacheService::new();
        cache
            .expect_get_url()
            .returning(|_| Err(CacheError::Connection("refused".to_string())));
        cache
            .expect_set_url()
            .returning(|_, _| Err(CacheError::Connection("refused".to_string())));

        let mut repository = MockShortUrlRepository::new();
        repository
            .expect_find_by_code()
            .returning(|code| Ok(Some(record(code, Utc::now() + Duration::hours(1)))));

        let service = service_with(
            Arc::new(repository),
            Arc::new(cache),
            Arc::new(RandomCodeGenerator::default()),
        );

        assert_eq!(service.get_url("abc123").await.unwrap(), "https://example.com/");
    }

    #[tokio::test]
    async fn test_incr_views_counts_in_cache() {
        let (service, _, cache) = memory_service();

        let handles: Vec<_> = (0..10).map(|_| service.incr_views("abc123")).collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.get_views("abc123").await.unwrap(), 10);
    }

    #[test]
    fn test_incr_views_pending_at_shutdown_is_lost() {
        let cache = Arc::new(MemoryCache::default());
        let service = service_with(
            Arc::new(MemoryShortUrlRepository::new()),
            cache.clone(),
            Arc::new(RandomCodeGenerator::default()),
        );

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        {
            // nothing drives a current-thread runtime outside block_on, so the
            // spawned increment is still queued when the runtime goes away
            let _guard = runtime.enter();
            drop(service.incr_views("abc123"));
        }
        runtime.shutdown_background();

        let check = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        assert_eq!(check.block_on(cache.get_views("abc123")).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_urls_pages_and_adds_pending_views() {
        let (service, repository, cache) = memory_service();

        let mut codes = Vec::new();
        for i in 0..25 {
            let created = service
                .create_url(CreateUrl {
                    original_url: format!("https://example.com/{i}"),
                    ..request(None)
                })
                .await
                .unwrap();
            codes.push(created.record.short_code);
        }
        service
            .create_url(CreateUrl {
                owner: Some(Owner(2)),
                ..request(None)
            })
            .await
            .unwrap();

        repository.add_views(&codes[10], 5).await.unwrap();
        cache.incr_views(&codes[10]).await.unwrap();
        cache.incr_views(&codes[10]).await.unwrap();

        let page = service.get_urls(Owner(1), 2, 10).await.unwrap();

        assert_eq!(page.total, 25);
        let page_codes: Vec<_> = page.items.iter().map(|i| &i.url.short_code).collect();
        assert_eq!(page_codes, codes[10..20].iter().collect::<Vec<_>>());
        assert_eq!(page.items[0].views, 7);
        assert_eq!(page.items[1].views, 0);
    }

    #[tokio::test]
    async fn test_get_urls_rejects_zero_page() {
        let (service, _, _) = memory_service();
        assert!(matches!(
            service.get_urls(Owner(1), 0, 10).await.unwrap_err(),
            AppError::Validation { .. }
        ));
    }

    #[tokio::test]
    async fn test_delete_twice_is_not_found() {
        let (service, _, cache) = memory_service();

        service.create_url(request(Some("abcd"))).await.unwrap();
        cache.incr_views("abcd").await.unwrap();

        service.delete_url("abcd").await.unwrap();
        assert!(cache.get_url("abcd").await.unwrap().is_none());
        assert_eq!(cache.get_views("abcd").await.unwrap(), 0);

        let err = service.delete_url("abcd").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_retry_clears_cache_left_by_failed_cleanup() {
        let mut cache = MockCacheService::new();
        cache.expect_set_url().returning(|_, _| Ok(()));
        let mut del_url_calls = 0;
        cache.expect_del_url().times(2).returning(move |_| {
            del_url_calls += 1;
            if del_url_calls == 1 {
                Err(CacheError::Connection("refused".to_string()))
            } else {
                Ok(())
            }
        });
        cache.expect_del_views().times(1).returning(|_| Ok(()));

        let repository = Arc::new(MemoryShortUrlRepository::new());
        let service = service_with(
            repository.clone(),
            Arc::new(cache),
            Arc::new(RandomCodeGenerator::default()),
        );
        service.create_url(request(Some("abcd"))).await.unwrap();

        let first = service.delete_url("abcd").await.unwrap_err();
        assert!(matches!(first, AppError::Internal { .. }));
        assert!(repository.find_by_code("abcd").await.unwrap().is_none());

        let retry = service.delete_url("abcd").await.unwrap_err();
        assert!(matches!(retry, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_owned_url_checks_owner() {
        let (service, repository, cache) = memory_service();
        service.create_url(request(Some("abcd"))).await.unwrap();

        assert!(matches!(
            service.delete_owned_url("abcd", Owner(2)).await.unwrap_err(),
            AppError::NotFound { .. }
        ));
        assert!(repository.find_by_code("abcd").await.unwrap().is_some());
        assert!(cache.get_url("abcd").await.unwrap().is_some());

        service.delete_owned_url("abcd", Owner(1)).await.unwrap();
        assert!(repository.find_by_code("abcd").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_owned_url_clears_orphaned_cache_entry() {
        let (service, _, cache) = memory_service();
        cache.set_url("gone", "https://example.com/").await.unwrap();
        cache.incr_views("gone").await.unwrap();

        let err = service.delete_owned_url("gone", Owner(1)).await.unwrap_err();

        assert!(matches!(err, AppError::NotFound { .. }));
        assert!(cache.get_url("gone").await.unwrap().is_none());
        assert_eq!(cache.get_views("gone").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_duration_keeps_cache_entry() {
        let (service, repository, cache) = memory_service();
        service.create_url(request(Some("abcd"))).await.unwrap();

        let new_expiry = Utc::now() + Duration::hours(3);
        service.update_url_duration("abcd", new_expiry).await.unwrap();

        let stored = repository.find_by_code("abcd").await.unwrap().unwrap();
        assert_eq!(stored.expires_at, new_expiry);
        assert!(cache.get_url("abcd").await.unwrap().is_some());

        assert!(matches!(
            service
                .update_url_duration("nope", new_expiry)
                .await
                .unwrap_err(),
            AppError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_ensure_owner_hides_foreign_records() {
        let (service, _, _) = memory_service();
        service.create_url(request(Some("abcd"))).await.unwrap();

        assert!(service.ensure_owner("abcd", Owner(1)).await.is_ok());
        assert!(matches!(
            service.ensure_owner("abcd", Owner(2)).await.unwrap_err(),
            AppError::NotFound { .. }
        ));
        assert!(matches!(
            service.ensure_owner("zzzz", Owner(1)).await.unwrap_err(),
            AppError::NotFound { .. }
        ));
    }
}
