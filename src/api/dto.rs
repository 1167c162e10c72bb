//! Data Transfer Objects
//!
//! Response bodies for the HTTP endpoints.

use serde::Serialize;

/// Body of `GET /api`
#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub message: String,
}

/// Body of `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub hub: String,
    pub subscribers: usize,
    pub uptime_seconds: u64,
    pub version: String,
}
