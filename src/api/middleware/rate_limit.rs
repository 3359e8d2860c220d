//! Per-client rate limiting using the token bucket algorithm.

use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::PeerIpKeyExtractor,
};

/// Token bucket quota applied to each client IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Seconds to replenish one request in the bucket.
    pub replenish_seconds: u64,
    /// Bucket size, the number of requests allowed in a burst.
    pub burst: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            replenish_seconds: 2,
            burst: 100,
        }
    }
}

/// Creates a rate limiter keyed by the socket peer address.
///
/// Requests exceeding the quota receive `429 Too Many Requests`. The router
/// must be served with `into_make_service_with_connect_info::<SocketAddr>()`
/// so the peer address is available.
///
/// Zero values are raised to 1.
///
/// # Example
///
/// ```rust,ignore
/// let api = Router::new()
///     .route("/urls", post(create_url_handler))
///     .layer(rate_limit::layer(RateLimit::default()));
/// ```
pub fn layer(
    limit: RateLimit,
) -> GovernorLayer<PeerIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body> {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(limit.replenish_seconds.max(1))
            .burst_size(limit.burst.max(1))
            .finish()
            .expect("non-zero rate limit quota"),
    );

    GovernorLayer::new(governor_conf)
}
