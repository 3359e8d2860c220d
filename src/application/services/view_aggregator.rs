//! Periodic reconciliation of cached view counters into the store.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::domain::repositories::ShortUrlRepository;
use crate::error::AppError;
use crate::infrastructure::cache::{CacheError, CacheService};

/// Counter keys requested per scan step.
pub const SCAN_BATCH_SIZE: usize = 100;

/// A sweep that stopped early. The next sweep starts over.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Failed to scan view counters: {0}")]
    Scan(#[source] CacheError),

    #[error("Failed to read view counter for '{code}': {source}")]
    ReadCounter { code: String, source: CacheError },

    #[error("Failed to persist {delta} views for '{code}': {source}")]
    Persist {
        code: String,
        delta: i64,
        source: AppError,
    },

    #[error("Failed to settle view counter for '{code}': {source}")]
    Settle { code: String, source: CacheError },
}

/// Outcome of one complete sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub keys_scanned: u64,
    pub keys_flushed: u64,
    pub views_flushed: i64,
}

/// Health of the background aggregator, shared with the health endpoint.
#[derive(Debug, Default)]
pub struct SyncStatus {
    /// Unix seconds of the last successful sweep, 0 when none yet.
    last_success: AtomicI64,
    consecutive_failures: AtomicU64,
}

impl SyncStatus {
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        match self.last_success.load(Ordering::Relaxed) {
            0 => None,
            secs => DateTime::from_timestamp(secs, 0),
        }
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    fn record_success(&self) {
        self.last_success
            .store(Utc::now().timestamp(), Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// Drains per-code view counters from the cache into the store.
///
/// Each counter is read, its value added to the durable `view_count`, and
/// then the same amount is subtracted from the counter. Visits that land
/// between the read and the subtraction stay in the counter for the next
/// sweep. If the process dies after the add but before the subtraction,
/// that batch is counted twice.
///
/// Running two aggregators against the same cache double counts, so exactly
/// one must run per deployment.
pub struct ViewAggregator {
    repository: Arc<dyn ShortUrlRepository>,
    cache: Arc<dyn CacheService>,
    batch_size: usize,
    status: Arc<SyncStatus>,
}

impl ViewAggregator {
    pub fn new(repository: Arc<dyn ShortUrlRepository>, cache: Arc<dyn CacheService>) -> Self {
        Self {
            repository,
            cache,
            batch_size: SCAN_BATCH_SIZE,
            status: Arc::new(SyncStatus::default()),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn status(&self) -> Arc<SyncStatus> {
        Arc::clone(&self.status)
    }

    /// Runs one full sweep over every counter.
    ///
    /// Zero counters are skipped. The first failure aborts the sweep; counters
    /// not yet settled are picked up by the next one.
    ///
    /// # Errors
    ///
    /// Returns the [`SyncError`] that stopped the sweep.
    pub async fn sync_views_to_db(&self) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        let mut cursor = 0;

        loop {
            let (codes, next_cursor) = self
                .cache
                .scan_views(cursor, self.batch_size)
                .await
                .map_err(SyncError::Scan)?;

            for code in codes {
                report.keys_scanned += 1;

                let views = self
                    .cache
                    .get_views(&code)
                    .await
                    .map_err(|source| SyncError::ReadCounter {
                        code: code.clone(),
                        source,
                    })?;

                if views <= 0 {
                    continue;
                }

                self.repository
                    .add_views(&code, views)
                    .await
                    .map_err(|source| SyncError::Persist {
                        code: code.clone(),
                        delta: views,
                        source,
                    })?;

                self.cache
                    .settle_views(&code, views)
                    .await
                    .map_err(|source| SyncError::Settle {
                        code: code.clone(),
                        source,
                    })?;

                report.keys_flushed += 1;
                report.views_flushed += views;
            }

            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }

        Ok(report)
    }

    /// Runs [`sync_views_to_db`](Self::sync_views_to_db) and records the
    /// outcome in [`SyncStatus`], metrics and logs.
    ///
    /// Expired cache entries are purged afterwards. A failed purge is only
    /// logged.
    ///
    /// # Errors
    ///
    /// Returns the [`SyncError`] that stopped the sweep, already logged.
    pub async fn sweep(&self) -> Result<SyncReport, SyncError> {
        let result = self.sync_views_to_db().await;

        match &result {
            Ok(report) => {
                self.status.record_success();
                metrics::counter!("views_flushed_total")
                    .increment(report.views_flushed.unsigned_abs());

                if report.keys_flushed > 0 {
                    info!(
                        keys_scanned = report.keys_scanned,
                        keys_flushed = report.keys_flushed,
                        views_flushed = report.views_flushed,
                        "View counters flushed"
                    );
                } else {
                    debug!(keys_scanned = report.keys_scanned, "No pending views");
                }
            }
            Err(e) => {
                self.status.record_failure();
                metrics::counter!("view_sync_failures_total").increment(1);
                error!(
                    error = %e,
                    consecutive_failures = self.status.consecutive_failures(),
                    "View sync failed, retrying next tick"
                );
            }
        }

        match self.cache.purge_expired().await {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "Expired cache entries purged"),
            Err(e) => warn!(error = %e, "Failed to purge expired cache entries"),
        }

        result
    }

    /// Sweeps every `period` until `shutdown` flips to `true` or its sender
    /// is dropped.
    ///
    /// A sweep in progress always completes, and one last sweep runs on the
    /// way out so counters held in an in-process cache are not lost.
    pub async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        info!(interval_secs = period.as_secs_f64(), "View aggregator started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = self.sweep().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let _ = self.sweep().await;
        info!("View aggregator stopped");
    }
}
