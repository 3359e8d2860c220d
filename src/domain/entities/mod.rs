//! Core domain entities.
//!
//! - [`ShortUrl`] - A persisted short URL
//! - [`NewShortUrl`] - Input for creating one
//! - [`ShortUrlWithViews`] - A short URL with its live view total
//! - [`Owner`] - The caller a record belongs to

pub mod owner;
pub mod short_url;

pub use owner::Owner;
pub use short_url::{NewShortUrl, ShortUrl, ShortUrlWithViews};
