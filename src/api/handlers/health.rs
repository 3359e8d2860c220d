//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::state::AppState;

/// Failed sweeps in a row before view sync is reported as unhealthy.
const MAX_SYNC_FAILURES: u64 = 3;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: One or more components degraded
///
/// # Components Checked
///
/// 1. **Database**: `SELECT 1`
/// 2. **Cache**: Redis PING (always ok for the in-memory cache)
/// 3. **View sync**: recent sweeps of the view aggregator
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "checks": {
///     "database": { "status": "ok", "message": "Connected" },
///     "cache": { "status": "ok", "message": "Connected" },
///     "view_sync": { "status": "ok", "message": "Last sweep 2026-01-01T12:00:00Z" }
///   }
/// }
/// ```
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let (database, cache) = tokio::join!(check_database(&state), check_cache(&state));
    let view_sync = check_view_sync(&state);

    let all_healthy = database.is_ok() && cache.is_ok() && view_sync.is_ok();

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            database,
            cache,
            view_sync,
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

async fn check_database(state: &AppState) -> CheckStatus {
    if state.repository.health_check().await {
        CheckStatus::ok("Connected")
    } else {
        CheckStatus::error("Database connection failed")
    }
}

async fn check_cache(state: &AppState) -> CheckStatus {
    if state.cache.health_check().await {
        CheckStatus::ok("Connected")
    } else {
        CheckStatus::error("Cache connection failed")
    }
}

fn check_view_sync(state: &AppState) -> CheckStatus {
    let failures = state.sync_status.consecutive_failures();
    if failures >= MAX_SYNC_FAILURES {
        return CheckStatus::error(format!("{failures} consecutive sweeps failed"));
    }

    match state.sync_status.last_success() {
        Some(at) => CheckStatus::ok(format!("Last sweep {}", at.to_rfc3339())),
        None => CheckStatus::ok("No sweep completed yet"),
    }
}
