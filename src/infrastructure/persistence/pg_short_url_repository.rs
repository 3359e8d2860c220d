//! PostgreSQL implementation of the short URL repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

use crate::domain::entities::{NewShortUrl, ShortUrl};
use crate::domain::repositories::ShortUrlRepository;
use crate::error::AppError;

const COLUMNS: &str =
    "id, original_url, short_code, is_custom, expires_at, owner_id, view_count, created_at";

#[derive(FromRow)]
struct ShortUrlRow {
    id: i64,
    original_url: String,
    short_code: String,
    is_custom: bool,
    expires_at: DateTime<Utc>,
    owner_id: Option<i64>,
    view_count: i64,
    created_at: DateTime<Utc>,
}

impl From<ShortUrlRow> for ShortUrl {
    fn from(r: ShortUrlRow) -> Self {
        ShortUrl {
            id: r.id,
            original_url: r.original_url,
            short_code: r.short_code,
            is_custom: r.is_custom,
            expires_at: r.expires_at,
            owner_id: r.owner_id,
            view_count: r.view_count,
            created_at: r.created_at,
        }
    }
}

/// PostgreSQL repository for short URL records.
///
/// Uses bound parameters for every value. Code uniqueness is enforced by the
/// `short_urls_short_code_key` constraint; violations surface as
/// [`AppError::Conflict`].
pub struct PgShortUrlRepository {
    pool: Arc<PgPool>,
}

impl PgShortUrlRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShortUrlRepository for PgShortUrlRepository {
    async fn create(&self, new_url: NewShortUrl) -> Result<ShortUrl, AppError> {
        let row = sqlx::query_as::<_, ShortUrlRow>(&format!(
            r#"
            INSERT INTO short_urls (original_url, short_code, is_custom, expires_at, owner_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&new_url.original_url)
        .bind(&new_url.short_code)
        .bind(new_url.is_custom)
        .bind(new_url.expires_at)
        .bind(new_url.owner_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row.into())
    }

    async fn is_code_available(&self, code: &str) -> Result<bool, AppError> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM short_urls WHERE short_code = $1)",
        )
        .bind(code)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(!taken)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<ShortUrl>, AppError> {
        let row = sqlx::query_as::<_, ShortUrlRow>(&format!(
            "SELECT {COLUMNS} FROM short_urls WHERE short_code = $1"
        ))
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn delete_by_code(&self, code: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM short_urls WHERE short_code = $1")
            .bind(code)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_expiry_by_code(
        &self,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE short_urls SET expires_at = $2 WHERE short_code = $1")
            .bind(code)
            .bind(expires_at)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_views(&self, code: &str, delta: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE short_urls SET view_count = view_count + $2 WHERE short_code = $1")
            .bind(code)
            .bind(delta)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn list_by_owner(
        &self,
        owner_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ShortUrl>, i64), AppError> {
        let rows = sqlx::query_as::<_, ShortUrlRow>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM short_urls
            WHERE owner_id = $1
            ORDER BY id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        let total =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM short_urls WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_one(self.pool.as_ref())
                .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await
            .is_ok()
    }
}
