//! Business logic services for the application layer.

pub mod auth_service;
pub mod url_service;
pub mod verification_service;
pub mod view_aggregator;

pub use auth_service::AuthService;
pub use url_service::{CreateUrl, CreatedUrl, UrlPage, UrlService};
pub use verification_service::VerificationService;
pub use view_aggregator::{SyncError, SyncReport, SyncStatus, ViewAggregator};
