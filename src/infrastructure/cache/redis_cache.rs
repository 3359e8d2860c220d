//! Redis-backed cache implementation.

use super::service::{CacheError, CacheResult, CacheService};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use std::sync::LazyLock;
use tracing::{debug, info};

/// Subtracts a persisted delta and drops the counter once it is drained.
///
/// Runs atomically on the server, so an `INCR` can never slip in between the
/// decrement and the delete.
static SETTLE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local remaining = redis.call('DECRBY', KEYS[1], ARGV[1])
        if remaining <= 0 then
            redis.call('DEL', KEYS[1])
            return 0
        end
        return remaining
        ",
    )
});

const URL_PREFIX: &str = "url:";
const VIEWS_PREFIX: &str = "views:";
const VERIFY_PREFIX: &str = "verify:";

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
            CacheError::Connection(e.to_string())
        } else {
            CacheError::Operation(e.to_string())
        }
    }
}

/// Redis cache shared by every service instance.
///
/// Uses `ConnectionManager`, which multiplexes one connection and reconnects
/// transparently; cloning it is cheap.
///
/// Key layout:
///
/// - `url:{code}` - original URL, expires after the URL TTL
/// - `views:{code}` - pending view counter, no expiry
/// - `verify:{subject}` - verification code, expires after the verification TTL
pub struct RedisCache {
    client: ConnectionManager,
    url_ttl_seconds: u64,
    verification_ttl_seconds: u64,
}

impl RedisCache {
    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Arguments
    ///
    /// - `redis_url` - Redis connection string (e.g., `"redis://localhost:6379"`)
    /// - `url_ttl_seconds` - TTL for cached URL mappings (`CACHE_TTL_SECONDS`)
    /// - `verification_ttl_seconds` - TTL for verification codes
    ///   (`VERIFICATION_CODE_TTL_SECONDS`)
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Connection`] if the URL is invalid, the connection cannot
    /// be established, or the PING health check fails.
    pub async fn connect(
        redis_url: &str,
        url_ttl_seconds: u64,
        verification_ttl_seconds: u64,
    ) -> CacheResult<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            CacheError::Connection(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::Connection(format!("Failed to connect to Redis: {}", e))
        })?;

        let mut test_conn = manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut test_conn)
            .await
            .map_err(|e| CacheError::Connection(format!("Redis PING failed: {}", e)))?;

        info!("Connected to Redis");

        Ok(Self {
            client: manager,
            url_ttl_seconds,
            verification_ttl_seconds,
        })
    }

    fn url_key(short_code: &str) -> String {
        format!("{URL_PREFIX}{short_code}")
    }

    fn views_key(short_code: &str) -> String {
        format!("{VIEWS_PREFIX}{short_code}")
    }

    fn verify_key(subject: &str) -> String {
        format!("{VERIFY_PREFIX}{subject}")
    }
}

#[async_trait]
impl CacheService for RedisCache {
    async fn set_url(&self, short_code: &str, original_url: &str) -> CacheResult<()> {
        let mut conn = self.client.clone();
        conn.set_ex::<_, _, ()>(
            Self::url_key(short_code),
            original_url,
            self.url_ttl_seconds,
        )
        .await?;

        debug!(short_code, ttl = self.url_ttl_seconds, "Cache SET");
        Ok(())
    }

    async fn get_url(&self, short_code: &str) -> CacheResult<Option<String>> {
        let mut conn = self.client.clone();
        let url = conn
            .get::<_, Option<String>>(Self::url_key(short_code))
            .await?;

        match &url {
            Some(_) => debug!(short_code, "Cache HIT"),
            None => debug!(short_code, "Cache MISS"),
        }

        Ok(url)
    }

    async fn del_url(&self, short_code: &str) -> CacheResult<()> {
        let mut conn = self.client.clone();
        let deleted = conn.del::<_, i64>(Self::url_key(short_code)).await?;

        if deleted > 0 {
            debug!(short_code, "Cache DEL");
        }
        Ok(())
    }

    async fn incr_views(&self, short_code: &str) -> CacheResult<()> {
        let mut conn = self.client.clone();
        conn.incr::<_, _, i64>(Self::views_key(short_code), 1)
            .await?;
        Ok(())
    }

    async fn get_views(&self, short_code: &str) -> CacheResult<i64> {
        let mut conn = self.client.clone();
        let views = conn
            .get::<_, Option<i64>>(Self::views_key(short_code))
            .await?;
        Ok(views.unwrap_or(0))
    }

    async fn del_views(&self, short_code: &str) -> CacheResult<()> {
        let mut conn = self.client.clone();
        conn.del::<_, i64>(Self::views_key(short_code)).await?;
        Ok(())
    }

    async fn settle_views(&self, short_code: &str, delta: i64) -> CacheResult<i64> {
        let mut conn = self.client.clone();
        let remaining = SETTLE_SCRIPT
            .key(Self::views_key(short_code))
            .arg(delta)
            .invoke_async::<i64>(&mut conn)
            .await?;
        Ok(remaining)
    }

    async fn scan_views(&self, cursor: u64, batch_size: usize) -> CacheResult<(Vec<String>, u64)> {
        let mut conn = self.client.clone();
        let (next_cursor, keys) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(format!("{VIEWS_PREFIX}*"))
            .arg("COUNT")
            .arg(batch_size)
            .query_async::<(u64, Vec<String>)>(&mut conn)
            .await?;

        let codes = keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(VIEWS_PREFIX).map(str::to_string))
            .collect();

        Ok((codes, next_cursor))
    }

    async fn set_verification_code(&self, subject: &str, code: &str) -> CacheResult<()> {
        let mut conn = self.client.clone();
        conn.set_ex::<_, _, ()>(
            Self::verify_key(subject),
            code,
            self.verification_ttl_seconds,
        )
        .await?;
        Ok(())
    }

    async fn get_verification_code(&self, subject: &str) -> CacheResult<Option<String>> {
        let mut conn = self.client.clone();
        Ok(conn
            .get::<_, Option<String>>(Self::verify_key(subject))
            .await?)
    }

    async fn del_verification_code(&self, subject: &str) -> CacheResult<()> {
        let mut conn = self.client.clone();
        conn.del::<_, i64>(Self::verify_key(subject)).await?;
        Ok(())
    }

    async fn purge_expired(&self) -> CacheResult<usize> {
        // keys are written with EX
        Ok(0)
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}
