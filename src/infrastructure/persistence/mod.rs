//! Repository implementations.
//!
//! - [`PgShortUrlRepository`] - Short URL records in PostgreSQL
//! - [`PgTokenRepository`] - API token storage and validation
//! - [`MemoryShortUrlRepository`] - Short URL records in process memory

pub mod memory_short_url_repository;
pub mod pg_short_url_repository;
pub mod pg_token_repository;

pub use memory_short_url_repository::MemoryShortUrlRepository;
pub use pg_short_url_repository::PgShortUrlRepository;
pub use pg_token_repository::PgTokenRepository;
