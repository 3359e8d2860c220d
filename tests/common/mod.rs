#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::ConnectInfo;
use axum_test::TestServer;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tower::Layer;

use linkforge::api::middleware::rate_limit::RateLimit;
use linkforge::application::services::auth_service::hash_token_with;
use linkforge::application::services::{AuthService, UrlService, ViewAggregator};
use linkforge::domain::entities::{NewShortUrl, ShortUrl};
use linkforge::domain::repositories::{ApiToken, ShortUrlRepository, TokenRepository};
use linkforge::error::AppError;
use linkforge::infrastructure::cache::{CacheError, CacheResult, CacheService, MemoryCache};
use linkforge::infrastructure::persistence::MemoryShortUrlRepository;
use linkforge::routes;
use linkforge::state::AppState;
use linkforge::utils::code_generator::RandomCodeGenerator;

pub const BASE_URL: &str = "https://sho.rt";
pub const SIGNING_SECRET: &str = "test-signing-secret";
pub const OWNER_1_TOKEN: &str = "token-for-owner-1";
pub const OWNER_2_TOKEN: &str = "token-for-owner-2";

/// Fixed token table: `OWNER_1_TOKEN` -> 1, `OWNER_2_TOKEN` -> 2.
pub struct StaticTokens {
    owners: HashMap<String, i64>,
}

impl StaticTokens {
    pub fn new() -> Self {
        let owners = [(OWNER_1_TOKEN, 1), (OWNER_2_TOKEN, 2)]
            .into_iter()
            .map(|(token, owner)| (hash_token_with(SIGNING_SECRET, token), owner))
            .collect();
        Self { owners }
    }
}

#[async_trait]
impl TokenRepository for StaticTokens {
    async fn find_owner(&self, token_hash: &str) -> Result<Option<i64>, AppError> {
        Ok(self.owners.get(token_hash).copied())
    }

    async fn update_last_used(&self, _token_hash: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn create_token(
        &self,
        _name: &str,
        _owner_id: i64,
        _token_hash: &str,
    ) -> Result<ApiToken, AppError> {
        unimplemented!("not used by handler tests")
    }

    async fn list_tokens(&self) -> Result<Vec<ApiToken>, AppError> {
        Ok(Vec::new())
    }

    async fn find_by_id(&self, _id: i64) -> Result<Option<ApiToken>, AppError> {
        Ok(None)
    }

    async fn find_by_name(&self, _name: &str) -> Result<Option<ApiToken>, AppError> {
        Ok(None)
    }

    async fn revoke_token(&self, _id: i64) -> Result<(), AppError> {
        unimplemented!("not used by handler tests")
    }
}

/// A cache whose every operation fails, as if Redis were unreachable.
pub struct DownCache;

fn down<T>() -> CacheResult<T> {
    Err(CacheError::Connection("connection refused".to_string()))
}

#[async_trait]
impl CacheService for DownCache {
    async fn set_url(&self, _short_code: &str, _original_url: &str) -> CacheResult<()> {
        down()
    }
    async fn get_url(&self, _short_code: &str) -> CacheResult<Option<String>> {
        down()
    }
    async fn del_url(&self, _short_code: &str) -> CacheResult<()> {
        down()
    }
    async fn incr_views(&self, _short_code: &str) -> CacheResult<()> {
        down()
    }
    async fn get_views(&self, _short_code: &str) -> CacheResult<i64> {
        down()
    }
    async fn del_views(&self, _short_code: &str) -> CacheResult<()> {
        down()
    }
    async fn settle_views(&self, _short_code: &str, _delta: i64) -> CacheResult<i64> {
        down()
    }
    async fn scan_views(&self, _cursor: u64, _batch_size: usize) -> CacheResult<(Vec<String>, u64)> {
        down()
    }
    async fn set_verification_code(&self, _subject: &str, _code: &str) -> CacheResult<()> {
        down()
    }
    async fn get_verification_code(&self, _subject: &str) -> CacheResult<Option<String>> {
        down()
    }
    async fn del_verification_code(&self, _subject: &str) -> CacheResult<()> {
        down()
    }
    async fn purge_expired(&self) -> CacheResult<usize> {
        down()
    }
    async fn health_check(&self) -> bool {
        false
    }
}

/// A memory cache whose first `del_url` fails.
pub struct FlakyDeleteCache {
    inner: MemoryCache,
    failed: AtomicBool,
}

impl FlakyDeleteCache {
    pub fn new() -> Self {
        Self {
            inner: MemoryCache::default(),
            failed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl CacheService for FlakyDeleteCache {
    async fn set_url(&self, short_code: &str, original_url: &str) -> CacheResult<()> {
        self.inner.set_url(short_code, original_url).await
    }
    async fn get_url(&self, short_code: &str) -> CacheResult<Option<String>> {
        self.inner.get_url(short_code).await
    }
    async fn del_url(&self, short_code: &str) -> CacheResult<()> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            return down();
        }
        self.inner.del_url(short_code).await
    }
    async fn incr_views(&self, short_code: &str) -> CacheResult<()> {
        self.inner.incr_views(short_code).await
    }
    async fn get_views(&self, short_code: &str) -> CacheResult<i64> {
        self.inner.get_views(short_code).await
    }
    async fn del_views(&self, short_code: &str) -> CacheResult<()> {
        self.inner.del_views(short_code).await
    }
    async fn settle_views(&self, short_code: &str, delta: i64) -> CacheResult<i64> {
        self.inner.settle_views(short_code, delta).await
    }
    async fn scan_views(&self, cursor: u64, batch_size: usize) -> CacheResult<(Vec<String>, u64)> {
        self.inner.scan_views(cursor, batch_size).await
    }
    async fn set_verification_code(&self, subject: &str, code: &str) -> CacheResult<()> {
        self.inner.set_verification_code(subject, code).await
    }
    async fn get_verification_code(&self, subject: &str) -> CacheResult<Option<String>> {
        self.inner.get_verification_code(subject).await
    }
    async fn del_verification_code(&self, subject: &str) -> CacheResult<()> {
        self.inner.del_verification_code(subject).await
    }
    async fn purge_expired(&self) -> CacheResult<usize> {
        self.inner.purge_expired().await
    }
    async fn health_check(&self) -> bool {
        true
    }
}

/// Injects a fixed peer address, which the rate limiter keys on.
#[derive(Clone)]
pub struct MockConnectInfoLayer;

impl<S> Layer<S> for MockConnectInfoLayer {
    type Service = MockConnectInfoService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MockConnectInfoService { inner }
    }
}

#[derive(Clone)]
pub struct MockConnectInfoService<S> {
    inner: S,
}

impl<S, B> tower::Service<axum::http::Request<B>> for MockConnectInfoService<S>
where
    S: tower::Service<axum::http::Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        let addr: SocketAddr = "127.0.0.1:12345".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        self.inner.call(req)
    }
}

/// A running router over in-memory storage.
pub struct TestApp<C: CacheService + 'static = MemoryCache> {
    pub server: TestServer,
    pub repository: Arc<MemoryShortUrlRepository>,
    pub cache: Arc<C>,
    pub url_service: Arc<UrlService>,
    pub aggregator: ViewAggregator,
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(Arc::new(MemoryCache::default()), RateLimit::default())
}

pub fn spawn_app_with<C: CacheService + 'static>(cache: Arc<C>, rate_limit: RateLimit) -> TestApp<C> {
    let repository = Arc::new(MemoryShortUrlRepository::new());

    let url_service = Arc::new(UrlService::new(
        repository.clone(),
        cache.clone(),
        Arc::new(RandomCodeGenerator::default()),
        BASE_URL,
        chrono::Duration::hours(720),
    ));
    let auth_service = Arc::new(AuthService::new(
        Arc::new(StaticTokens::new()),
        SIGNING_SECRET.to_string(),
    ));

    let aggregator = url_service.view_aggregator();

    let state = AppState {
        url_service: url_service.clone(),
        auth_service,
        repository: repository.clone(),
        cache: cache.clone(),
        sync_status: aggregator.status(),
    };

    let app = routes::router(state, rate_limit).layer(MockConnectInfoLayer);
    let server = TestServer::new(app).unwrap();

    TestApp {
        server,
        repository,
        cache,
        url_service,
        aggregator,
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Inserts a record directly, bypassing the service.
pub async fn insert_url(
    repository: &MemoryShortUrlRepository,
    code: &str,
    original_url: &str,
    owner_id: Option<i64>,
    expires_at: DateTime<Utc>,
) -> ShortUrl {
    repository
        .create(NewShortUrl {
            original_url: original_url.to_string(),
            short_code: code.to_string(),
            is_custom: true,
            expires_at,
            owner_id,
        })
        .await
        .unwrap()
}

/// Waits until the cache counter for `code` reaches `expected`.
///
/// Redirects count views on spawned tasks, so the counter lags the response.
pub async fn wait_for_views(cache: &dyn CacheService, code: &str, expected: i64) {
    for _ in 0..100 {
        if cache.get_views(code).await.unwrap() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "counter for {code} did not reach {expected}, got {}",
        cache.get_views(code).await.unwrap()
    );
}
