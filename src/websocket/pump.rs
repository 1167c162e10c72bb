//! Connection Pumps
//!
//! Each connection runs two loops:
//!
//! - the **inbound pump** reads frames, normalizes payloads and submits them
//!   to the hub; it owns the read deadline, refreshed by every Pong;
//! - the **outbound pump** drains the subscriber's queue, coalescing whatever
//!   is already queued into a single newline-delimited text frame, and sends
//!   a Ping every `ping_period`.
//!
//! Both are generic over the transport so they can be driven by an axum
//! [`WebSocket`](axum::extract::ws::WebSocket) or by in-memory streams.

use axum::extract::ws::{close_code, CloseFrame, Message};
use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::hub::Hub;
use super::message::normalize;
use super::subscriber::Outbox;

/// Per-connection timing and size limits
#[derive(Debug, Clone, Copy)]
pub struct PumpConfig {
    /// Time allowed to write a frame to the peer
    pub write_wait: Duration,
    /// Time allowed between Pongs before the connection is considered dead
    pub pong_wait: Duration,
    /// Interval between Pings; must be shorter than `pong_wait`
    pub ping_period: Duration,
    /// Largest message accepted from the peer, in bytes
    pub max_message_size: usize,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            write_wait: Duration::from_secs(10),
            pong_wait: Duration::from_secs(60),
            ping_period: Duration::from_secs(54),
            max_message_size: 512,
        }
    }
}

/// Reasons a pump stops other than a clean close
#[derive(Debug, Error)]
pub enum PumpError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("No pong received within {0:?}")]
    PongTimeout(Duration),

    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("Message of {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("Hub is not running")]
    HubClosed,
}

/// Read frames from the peer and submit them to the hub.
///
/// Returns `Ok(())` when the peer closes the connection or the stream ends.
pub async fn inbound<S, E>(mut stream: S, hub: &Hub, config: &PumpConfig) -> Result<(), PumpError>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut deadline = Instant::now() + config.pong_wait;

    loop {
        let frame = match time::timeout_at(deadline, stream.next()).await {
            Err(_) => return Err(PumpError::PongTimeout(config.pong_wait)),
            Ok(None) => return Ok(()),
            Ok(Some(Err(e))) => return Err(PumpError::Transport(e.to_string())),
            Ok(Some(Ok(frame))) => frame,
        };

        let payload = match frame {
            Message::Text(text) => Bytes::from(text),
            Message::Binary(data) => Bytes::from(data),
            Message::Pong(_) => {
                deadline = Instant::now() + config.pong_wait;
                continue;
            }
            // Pings are answered by the transport
            Message::Ping(_) => continue,
            Message::Close(frame) => {
                log_close(frame.as_ref());
                return Ok(());
            }
        };

        if payload.len() > config.max_message_size {
            return Err(PumpError::MessageTooLarge {
                size: payload.len(),
                limit: config.max_message_size,
            });
        }

        hub.broadcast(normalize(&payload))
            .await
            .map_err(|_| PumpError::HubClosed)?;
    }
}

/// Write queued messages and keepalive Pings to the peer.
///
/// Returns `Ok(())` after sending a Close frame once the hub closes the
/// subscriber's queue. Messages still queued at that point are discarded.
pub async fn outbound<K, E>(mut sink: K, mut outbox: Outbox, config: &PumpConfig) -> Result<(), PumpError>
where
    K: Sink<Message, Error = E> + Unpin,
    E: Display,
{
    let mut keepalive = time::interval_at(Instant::now() + config.ping_period, config.ping_period);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let closed = outbox.close_signal();

    loop {
        // Close first, then keepalive, so a busy queue cannot starve Pings
        tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            _ = keepalive.tick() => {
                write(&mut sink, Message::Ping(Vec::new()), config.write_wait).await?;
            }
            message = outbox.recv() => {
                let Some(first) = message else { break };
                let batch = outbox.batch(first);
                if outbox.is_closed() {
                    break;
                }
                let text = String::from_utf8_lossy(&batch).into_owned();
                write(&mut sink, Message::Text(text), config.write_wait).await?;
            }
        }
    }

    let close = Message::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: "".into(),
    }));
    write(&mut sink, close, config.write_wait).await
}

async fn write<K, E>(sink: &mut K, frame: Message, wait: Duration) -> Result<(), PumpError>
where
    K: Sink<Message, Error = E> + Unpin,
    E: Display,
{
    match time::timeout(wait, sink.send(frame)).await {
        Err(_) => Err(PumpError::WriteTimeout(wait)),
        Ok(Err(e)) => Err(PumpError::Transport(e.to_string())),
        Ok(Ok(())) => Ok(()),
    }
}

fn log_close(frame: Option<&CloseFrame<'static>>) {
    match frame {
        Some(frame) if frame.code != close_code::NORMAL && frame.code != close_code::AWAY => {
            tracing::warn!(code = frame.code, reason = %frame.reason, "Unexpected close from peer");
        }
        _ => tracing::debug!("Peer closed connection"),
    }
}
