//! In-process cache implementation.

use super::service::{CacheResult, CacheService};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct Expiring {
    value: String,
    expires_at: Instant,
}

impl Expiring {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Debug)]
struct Counter {
    /// Insertion order, used as the scan cursor.
    seq: u64,
    value: i64,
}

/// Cache held in process memory.
///
/// Used when no Redis is configured and as the cache of the integration tests.
/// It is not shared between processes, so a deployment using it must run a
/// single instance.
///
/// Counters are ordered by creation: the scan cursor is the sequence number of
/// the next counter to return, which keeps iteration stateless and resumable
/// while counters come and go.
pub struct MemoryCache {
    urls: DashMap<String, Expiring>,
    views: DashMap<String, Counter>,
    verification: DashMap<String, Expiring>,
    next_seq: AtomicU64,
    url_ttl: Duration,
    verification_ttl: Duration,
}

impl MemoryCache {
    pub fn new(url_ttl: Duration, verification_ttl: Duration) -> Self {
        debug!("Using in-memory cache");
        Self {
            urls: DashMap::new(),
            views: DashMap::new(),
            verification: DashMap::new(),
            next_seq: AtomicU64::new(1),
            url_ttl,
            verification_ttl,
        }
    }

    fn read_live(map: &DashMap<String, Expiring>, key: &str) -> Option<String> {
        let entry = map.get(key)?;

        if entry.is_expired() {
            drop(entry);
            map.remove_if(key, |_, e| e.is_expired());
            return None;
        }

        Some(entry.value.clone())
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600), Duration::from_secs(300))
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn set_url(&self, short_code: &str, original_url: &str) -> CacheResult<()> {
        self.urls.insert(
            short_code.to_string(),
            Expiring {
                value: original_url.to_string(),
                expires_at: Instant::now() + self.url_ttl,
            },
        );
        Ok(())
    }

    async fn get_url(&self, short_code: &str) -> CacheResult<Option<String>> {
        Ok(Self::read_live(&self.urls, short_code))
    }

    async fn del_url(&self, short_code: &str) -> CacheResult<()> {
        self.urls.remove(short_code);
        Ok(())
    }

    async fn incr_views(&self, short_code: &str) -> CacheResult<()> {
        let mut counter = self
            .views
            .entry(short_code.to_string())
            .or_insert_with(|| Counter {
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                value: 0,
            });
        counter.value += 1;
        Ok(())
    }

    async fn get_views(&self, short_code: &str) -> CacheResult<i64> {
        Ok(self.views.get(short_code).map_or(0, |c| c.value))
    }

    async fn del_views(&self, short_code: &str) -> CacheResult<()> {
        self.views.remove(short_code);
        Ok(())
    }

    async fn settle_views(&self, short_code: &str, delta: i64) -> CacheResult<i64> {
        match self.views.entry(short_code.to_string()) {
            Entry::Occupied(mut occupied) => {
                let remaining = occupied.get().value - delta;
                if remaining <= 0 {
                    occupied.remove();
                    Ok(0)
                } else {
                    occupied.get_mut().value = remaining;
                    Ok(remaining)
                }
            }
            Entry::Vacant(_) => Ok(0),
        }
    }

    async fn scan_views(&self, cursor: u64, batch_size: usize) -> CacheResult<(Vec<String>, u64)> {
        let mut pending: Vec<(u64, String)> = self
            .views
            .iter()
            .filter(|c| c.seq >= cursor)
            .map(|c| (c.seq, c.key().clone()))
            .collect();
        pending.sort_unstable_by_key(|(seq, _)| *seq);

        let batch_size = batch_size.max(1);
        let next_cursor = pending.get(batch_size).map_or(0, |(seq, _)| *seq);
        let codes = pending
            .into_iter()
            .take(batch_size)
            .map(|(_, code)| code)
            .collect();

        Ok((codes, next_cursor))
    }

    async fn set_verification_code(&self, subject: &str, code: &str) -> CacheResult<()> {
        self.verification.insert(
            subject.to_string(),
            Expiring {
                value: code.to_string(),
                expires_at: Instant::now() + self.verification_ttl,
            },
        );
        Ok(())
    }

    async fn get_verification_code(&self, subject: &str) -> CacheResult<Option<String>> {
        Ok(Self::read_live(&self.verification, subject))
    }

    async fn del_verification_code(&self, subject: &str) -> CacheResult<()> {
        self.verification.remove(subject);
        Ok(())
    }

    async fn purge_expired(&self) -> CacheResult<usize> {
        let before = self.urls.len() + self.verification.len();
        self.urls.retain(|_, e| !e.is_expired());
        self.verification.retain(|_, e| !e.is_expired());
        Ok(before.saturating_sub(self.urls.len() + self.verification.len()))
    }

    async fn health_check(&self) -> bool {
        true
    }
}
