//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle:
//! create a subscriber, register it with the shared hub, run both pumps and
//! make sure the subscriber is unregistered however the connection ends.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tracing::Instrument;

use super::hub::Hub;
use super::pump::{self, PumpConfig, PumpError};
use super::subscriber::SubscriberId;
use crate::api::AppState;

/// WebSocket upgrade handler
///
/// This is the entry point for chat room connections. Frames larger than
/// the configured message size are rejected by the transport.
pub async fn chatroom_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = state.hub.clone();
    let config = state.pump;

    ws.max_message_size(config.max_message_size)
        .max_frame_size(config.max_message_size)
        .on_failed_upgrade(|e| tracing::warn!(error = %e, "Failed to upgrade connection"))
        .on_upgrade(move |socket| handle_socket(socket, hub, config))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Hub, config: PumpConfig) {
    let (sender, receiver) = socket.split();
    serve_connection(sender, receiver, hub, config).await;
}

/// Unregisters the subscriber when dropped, including when the connection
/// task is cancelled mid-flight.
struct Registration {
    hub: Hub,
    id: SubscriberId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.hub.unregister_detached(self.id);
    }
}

enum Finished {
    Inbound(Result<(), PumpError>),
    Outbound(Result<(), PumpError>),
}

/// Wire one duplex connection into the hub and run it to completion.
pub async fn serve_connection<K, S, E>(mut sender: K, receiver: S, hub: Hub, config: PumpConfig)
where
    K: Sink<Message, Error = E> + Unpin,
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let (subscriber, outbox) = hub.subscriber();
    let id = subscriber.id();
    let span = tracing::info_span!("connection", subscriber = %id);

    async move {
        if let Err(e) = hub.register(subscriber).await {
            tracing::warn!(error = %e, "Rejecting connection");
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
        let registration = Registration {
            hub: hub.clone(),
            id,
        };
        tracing::info!("Subscriber connected");

        let inbound = pump::inbound(receiver, &hub, &config);
        let outbound = pump::outbound(sender, outbox, &config);
        tokio::pin!(inbound, outbound);

        let finished = tokio::select! {
            result = &mut inbound => Finished::Inbound(result),
            result = &mut outbound => Finished::Outbound(result),
        };

        match finished {
            Finished::Inbound(result) => {
                log_exit("inbound", &result);
                // Once unregistered, the hub closes the queue and the outbound
                // pump sends a Close frame on its way out
                drop(registration);
                match tokio::time::timeout(config.write_wait, &mut outbound).await {
                    Ok(result) => log_exit("outbound", &result),
                    Err(_) => tracing::debug!("Outbound pump did not finish in time"),
                }
            }
            Finished::Outbound(result) => {
                log_exit("outbound", &result);
                drop(registration);
            }
        }

        tracing::info!("Subscriber disconnected");
    }
    .instrument(span)
    .await
}

fn log_exit(pump: &str, result: &Result<(), PumpError>) {
    match result {
        Ok(()) => tracing::debug!(pump, "Pump finished"),
        Err(PumpError::Transport(e)) => {
            tracing::debug!(pump, error = %e, "Connection closed abnormally")
        }
        Err(e) => tracing::debug!(pump, error = %e, "Pump stopped"),
    }
}
