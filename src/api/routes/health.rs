//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (hub is accepting connections)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

/// GET /health/live
///
/// Kubernetes liveness probe.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Kubernetes readiness probe.
/// Returns 200 while the hub loop is running, 503 once it has stopped.
pub async fn readiness(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    if state.hub.is_running() {
        Ok(StatusCode::OK)
    } else {
        Err(ApiError::ServiceUnavailable("hub is not running".to_string()))
    }
}

/// GET /health
///
/// Full health status with hub details.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let running = state.hub.is_running();

    Json(HealthResponse {
        status: if running { "healthy" } else { "unhealthy" }.to_string(),
        hub: if running { "running" } else { "stopped" }.to_string(),
        subscribers: state.hub.members(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }
}
