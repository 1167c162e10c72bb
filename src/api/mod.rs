//! Socki HTTP API
//!
//! HTTP layer for the chat room, built with Axum.
//!
//! # Endpoints
//!
//! ## API
//! - `GET /api` - Welcome message
//! - `GET /api/chatroom` - WebSocket connection to the room
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! ## Static assets
//! Any other path is served from the configured static directory, if any.
//!
//! # Example
//!
//! ```rust,ignore
//! use socki::api::{serve, ApiConfig, AppState};
//! use socki::websocket::{Hub, HubConfig, PumpConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let shutdown = CancellationToken::new();
//!     let (hub, hub_task) = Hub::spawn(HubConfig::default(), shutdown.clone());
//!     let config = ApiConfig::default();
//!
//!     let state = AppState::new(hub, PumpConfig::default());
//!     serve(state, &config, shutdown).await?;
//!     hub_task.await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::{
    http::{header, HeaderValue},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use crate::websocket::chatroom_handler;

/// Build the router with all routes and middleware
pub fn build_router(state: AppState, config: &ApiConfig) -> Router {
    let api_routes = Router::new()
        .route("/", get(routes::index::welcome))
        .route("/chatroom", get(chatroom_handler))
        .fallback(routes::index::not_found)
        .layer(CorsLayer::permissive());

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    // Create shared state
    let shared_state = Arc::new(state);

    let router = Router::new()
        .nest("/api", api_routes)
        .nest("/health", health_routes);

    let router = match &config.static_dir {
        Some(dir) => {
            let assets = ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::REFERRER_POLICY,
                    HeaderValue::from_static("same-origin"),
                ))
                .service(ServeDir::new(dir));
            router.fallback_service(assets)
        }
        None => router.fallback(routes::index::not_found),
    };

    router
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// Bind the configured address and serve until `shutdown` fires
pub async fn serve(
    state: AppState,
    config: &ApiConfig,
    shutdown: CancellationToken,
) -> Result<(), ApiError> {
    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    serve_listener(listener, state, config, shutdown).await
}

/// Serve on an already bound listener until `shutdown` fires
pub async fn serve_listener(
    listener: TcpListener,
    state: AppState,
    config: &ApiConfig,
    shutdown: CancellationToken,
) -> Result<(), ApiError> {
    let router = build_router(state, config);

    tracing::info!("Socki listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Socki API shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::{Hub, HubConfig, PumpConfig};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app(config: &ApiConfig) -> (Router, Hub, tokio::task::JoinHandle<()>) {
        let (hub, handle) = Hub::spawn(HubConfig::default(), CancellationToken::new());
        let state = AppState::new(hub.clone(), PumpConfig::default());
        (build_router(state, config), hub, handle)
    }

    async fn get(app: Router, uri: &str) -> axum::response::Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_welcome() {
        let (app, _hub, _handle) = create_test_app(&ApiConfig::default());

        let response = get(app, "/api").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Welcome to the socki API");
    }

    #[tokio::test]
    async fn test_health_live() {
        let (app, _hub, _handle) = create_test_app(&ApiConfig::default());

        let response = get(app, "/health/live").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready_follows_hub() {
        let (app, hub, handle) = create_test_app(&ApiConfig::default());

        let response = get(app.clone(), "/health/ready").await;
        assert_eq!(response.status(), StatusCode::OK);

        hub.shutdown();
        handle.await.unwrap();

        let response = get(app, "/health/ready").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health_full() {
        let (app, _hub, _handle) = create_test_app(&ApiConfig::default());

        let response = get(app, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["subscribers"], 0);
    }

    #[tokio::test]
    async fn test_chatroom_requires_upgrade() {
        let (app, _hub, _handle) = create_test_app(&ApiConfig::default());

        let response = get(app, "/api/chatroom").await;
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_unknown_path_is_json_404() {
        let (app, _hub, _handle) = create_test_app(&ApiConfig::default());

        let response = get(app, "/api/nope").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_static_assets_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>socki</h1>").unwrap();
        let config = ApiConfig {
            static_dir: Some(dir.path().to_path_buf()),
            ..ApiConfig::default()
        };
        let (app, _hub, _handle) = create_test_app(&config);

        let response = get(app.clone(), "/index.html").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert_eq!(response.headers()["referrer-policy"], "same-origin");
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/html"));

        // API paths still win over static files
        let response = get(app, "/api").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
