//! In-memory implementation of the short URL repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::json;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::domain::entities::{NewShortUrl, ShortUrl};
use crate::domain::repositories::ShortUrlRepository;
use crate::error::AppError;

/// Short URL store held in process memory.
///
/// Keyed by short code; the entry API makes the uniqueness check and the
/// insert a single step, mirroring the database constraint. Data is lost on
/// restart, so this backs tests and local runs only.
#[derive(Debug, Default)]
pub struct MemoryShortUrlRepository {
    records: DashMap<String, ShortUrl>,
    next_id: AtomicI64,
}

impl MemoryShortUrlRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ShortUrlRepository for MemoryShortUrlRepository {
    async fn create(&self, new_url: NewShortUrl) -> Result<ShortUrl, AppError> {
        match self.records.entry(new_url.short_code.clone()) {
            Entry::Occupied(_) => Err(AppError::conflict(
                "Unique constraint violation",
                json!({ "constraint": "short_urls_short_code_key" }),
            )),
            Entry::Vacant(vacant) => {
                let record = ShortUrl {
                    id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
                    original_url: new_url.original_url,
                    short_code: new_url.short_code,
                    is_custom: new_url.is_custom,
                    expires_at: new_url.expires_at,
                    owner_id: new_url.owner_id,
                    view_count: 0,
                    created_at: Utc::now(),
                };
                vacant.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn is_code_available(&self, code: &str) -> Result<bool, AppError> {
        Ok(!self.records.contains_key(code))
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<ShortUrl>, AppError> {
        Ok(self.records.get(code).map(|r| r.clone()))
    }

    async fn delete_by_code(&self, code: &str) -> Result<bool, AppError> {
        Ok(self.records.remove(code).is_some())
    }

    async fn update_expiry_by_code(
        &self,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        Ok(self
            .records
            .get_mut(code)
            .map(|mut r| r.expires_at = expires_at)
            .is_some())
    }

    async fn add_views(&self, code: &str, delta: i64) -> Result<(), AppError> {
        if let Some(mut record) = self.records.get_mut(code) {
            record.view_count += delta;
        }
        Ok(())
    }

    async fn list_by_owner(
        &self,
        owner_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ShortUrl>, i64), AppError> {
        let mut owned: Vec<ShortUrl> = self
            .records
            .iter()
            .filter(|r| r.owner_id == Some(owner_id))
            .map(|r| r.clone())
            .collect();
        owned.sort_unstable_by_key(|r| r.id);

        let total = owned.len() as i64;
        let page = owned
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();

        Ok((page, total))
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_url(code: &str, owner_id: Option<i64>) -> NewShortUrl {
        NewShortUrl {
            original_url: "https://example.com/".to_string(),
            short_code: code.to_string(),
            is_custom: false,
            expires_at: Utc::now() + Duration::hours(1),
            owner_id,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let repo = MemoryShortUrlRepository::new();

        let a = repo.create(new_url("aaaa", None)).await.unwrap();
        let b = repo.create(new_url("bbbb", None)).await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(a.view_count, 0);
    }

    #[tokio::test]
    async fn test_create_duplicate_code_conflicts() {
        let repo = MemoryShortUrlRepository::new();

        repo.create(new_url("abcd", None)).await.unwrap();
        let err = repo.create(new_url("abcd", None)).await.unwrap_err();

        assert!(matches!(err, AppError::Conflict { .. }));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete_report_missing() {
        let repo = MemoryShortUrlRepository::new();

        assert!(
            !repo
                .update_expiry_by_code("nope", Utc::now())
                .await
                .unwrap()
        );
        assert!(!repo.delete_by_code("nope").await.unwrap());

        repo.create(new_url("abcd", None)).await.unwrap();
        assert!(repo.delete_by_code("abcd").await.unwrap());
        assert!(repo.is_code_available("abcd").await.unwrap());
    }

    #[tokio::test]
    async fn test_add_views_accumulates() {
        let repo = MemoryShortUrlRepository::new();
        repo.create(new_url("abcd", None)).await.unwrap();

        repo.add_views("abcd", 3).await.unwrap();
        repo.add_views("abcd", 4).await.unwrap();
        repo.add_views("gone", 9).await.unwrap();

        let record = repo.find_by_code("abcd").await.unwrap().unwrap();
        assert_eq!(record.view_count, 7);
    }

    #[tokio::test]
    async fn test_list_by_owner_pages_in_creation_order() {
        let repo = MemoryShortUrlRepository::new();
        for i in 0..25 {
            repo.create(new_url(&format!("code{i:02}"), Some(1)))
                .await
                .unwrap();
        }
        repo.create(new_url("other", Some(2))).await.unwrap();

        let (page, total) = repo.list_by_owner(1, 10, 10).await.unwrap();

        assert_eq!(total, 25);
        let codes: Vec<_> = page.iter().map(|r| r.short_code.as_str()).collect();
        assert_eq!(codes.first(), Some(&"code10"));
        assert_eq!(codes.last(), Some(&"code19"));
    }
}
