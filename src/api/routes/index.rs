//! API Index Routes
//!
//! - GET /api - Welcome message
//! - Fallback for unknown API paths

use axum::{http::Uri, Json};

use crate::api::dto::WelcomeResponse;
use crate::api::error::ApiError;

/// GET /api
pub async fn welcome() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to the socki API".to_string(),
    })
}

/// Any path without a route
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
