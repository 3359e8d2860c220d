//! Application layer services implementing business logic.
//!
//! Services consume repository and cache traits and give HTTP handlers and
//! the admin CLI a small API.
//!
//! - [`services::UrlService`] - Short URL creation, resolution and management
//! - [`services::ViewAggregator`] - Periodic flush of cached view counters
//! - [`services::AuthService`] - API token authentication
//! - [`services::VerificationService`] - One-time verification codes

pub mod services;
