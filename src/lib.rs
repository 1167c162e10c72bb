//! # Socki
//!
//! A single-room, in-memory chat hub: clients connect over WebSocket, send
//! text messages, and receive every message broadcast by any connected
//! client.
//!
//! ## Features
//!
//! - **Serialized membership**: one hub loop owns the room, no locks
//! - **Backpressure**: slow subscribers are evicted instead of stalling the room
//! - **Keepalive**: Ping/Pong with read and write deadlines on every connection
//! - **Batching**: queued messages go out as one newline-delimited frame
//!
//! ## Modules
//!
//! - [`websocket`]: Hub, subscribers and per-connection pumps
//! - [`api`]: HTTP server with Axum
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use socki::websocket::{Hub, HubConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // One hub per room, shared by every connection
//!     let (hub, hub_task) = Hub::spawn(HubConfig::default(), CancellationToken::new());
//!
//!     let (subscriber, mut outbox) = hub.subscriber();
//!     hub.register(subscriber).await?;
//!     hub.broadcast("hello").await?;
//!
//!     assert_eq!(outbox.recv().await.as_deref(), Some(&b"hello"[..]));
//!
//!     // Evicts every member and stops the loop
//!     hub.shutdown();
//!     hub_task.await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod websocket;

pub use api::{build_router, serve, serve_listener, ApiConfig, ApiError, AppState};

pub use websocket::{
    chatroom_handler, normalize, serve_connection, Hub, HubConfig, HubError, HubLoop, Outbox,
    PumpConfig, PumpError, Subscriber, SubscriberId,
};

pub use config::{ChatroomConfig, Config, ConfigError, LoggingConfig, ServerConfig};
