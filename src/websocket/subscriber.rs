//! Subscribers and Their Outbound Queues
//!
//! A subscriber is split in two when a connection is accepted:
//!
//! - [`Subscriber`] holds the sending half of the bounded outbound queue. It
//!   is handed to the hub on registration and owned by the registry from then
//!   on. Closing it consumes it, so a queue can only ever be closed once.
//! - [`Outbox`] holds the receiving half and is owned by the outbound pump.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Unique identifier for a connected subscriber
pub type SubscriberId = Uuid;

/// Registry-side handle of a connected peer
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    queue: mpsc::Sender<Bytes>,
    closed: CancellationToken,
}

/// Pump-side end of a subscriber's outbound queue
#[derive(Debug)]
pub struct Outbox {
    id: SubscriberId,
    queue: mpsc::Receiver<Bytes>,
    closed: CancellationToken,
    capacity: usize,
}

/// Why a message could not be enqueued for a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Undeliverable {
    /// Queue is full: the peer is not keeping up
    SlowConsumer,
    /// The outbound pump is gone
    Disconnected,
}

/// Create a subscriber with an outbound queue holding at most `capacity`
/// messages.
pub fn channel(capacity: usize) -> (Subscriber, Outbox) {
    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(capacity);
    let closed = CancellationToken::new();

    let subscriber = Subscriber {
        id,
        queue: tx,
        closed: closed.clone(),
    };
    let outbox = Outbox {
        id,
        queue: rx,
        closed,
        capacity,
    };

    (subscriber, outbox)
}

impl Subscriber {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Enqueue without waiting.
    pub(crate) fn try_deliver(&self, message: Bytes) -> Result<(), Undeliverable> {
        self.queue.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => Undeliverable::SlowConsumer,
            TrySendError::Closed(_) => Undeliverable::Disconnected,
        })
    }

    /// Close the outbound queue and signal the outbound pump to stop.
    pub(crate) fn close(self) {
        self.closed.cancel();
    }
}

impl Outbox {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Whether the hub has closed this queue
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// A token that fires when the hub closes this queue. Cancelling it
    /// does not close the queue.
    pub fn close_signal(&self) -> CancellationToken {
        self.closed.child_token()
    }

    /// Wait for the next message.
    ///
    /// Returns `None` once the queue is closed, even if messages are still
    /// buffered: the close signal wins over pending data.
    pub async fn recv(&mut self) -> Option<Bytes> {
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => None,
            message = self.queue.recv() => message,
        }
    }

    /// Take the next message if one is already queued and the queue is open.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        if self.is_closed() {
            return None;
        }
        self.queue.try_recv().ok()
    }

    /// Append every message already waiting in the queue to `first`,
    /// newline-separated.
    ///
    /// Bounded by the queue capacity so a steady stream of fan-out cannot keep
    /// a single batch open forever.
    pub fn batch(&mut self, first: Bytes) -> Bytes {
        let mut buf = BytesMut::from(&first[..]);

        for _ in 0..self.capacity {
            match self.try_recv() {
                Some(next) => {
                    buf.put_u8(b'\n');
                    buf.extend_from_slice(&next);
                }
                None => break,
            }
        }

        buf.freeze()
    }
}
