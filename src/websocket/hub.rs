//! Chat Room Hub
//!
//! Single authority over room membership and message fan-out.
//!
//! The hub is split into a cloneable [`Hub`] handle, which only submits
//! intents over three bounded intake channels (register, unregister,
//! broadcast), and a [`HubLoop`] that owns the registry. The loop is the only
//! code that ever mutates membership or closes a subscriber's queue, so no
//! locks are needed.

use bytes::Bytes;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::subscriber::{self, Outbox, Subscriber, SubscriberId, Undeliverable};

/// Configuration for a room hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Room name, used for log context only
    pub room: String,
    /// Outbound queue capacity per subscriber
    pub send_queue_capacity: usize,
    /// Capacity of each intake channel
    pub intake_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            room: "lobby".to_string(),
            send_queue_capacity: 256,
            intake_capacity: 64,
        }
    }
}

/// Handle for submitting membership changes and messages to a running hub
#[derive(Clone)]
pub struct Hub {
    register_tx: mpsc::Sender<Subscriber>,
    unregister_tx: mpsc::Sender<SubscriberId>,
    broadcast_tx: mpsc::Sender<Bytes>,
    members: watch::Receiver<usize>,
    stop: CancellationToken,
    send_queue_capacity: usize,
}

/// The hub's serialized event loop. Run it with [`HubLoop::run`].
pub struct HubLoop {
    register_rx: mpsc::Receiver<Subscriber>,
    unregister_rx: mpsc::Receiver<SubscriberId>,
    broadcast_rx: mpsc::Receiver<Bytes>,
    registry: Registry,
    stop: CancellationToken,
    span: tracing::Span,
}

/// Errors returned by the hub handle
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("Hub is not running")]
    Closed,
}

enum Event {
    Register(Subscriber),
    Unregister(SubscriberId),
    Broadcast(Bytes),
    Stop,
}

impl Hub {
    /// Create a hub handle and its event loop.
    ///
    /// The loop must be running (see [`HubLoop::run`]) before `register` is
    /// called, or callers will wait once the intake buffer fills.
    pub fn new(config: HubConfig) -> (Hub, HubLoop) {
        let (register_tx, register_rx) = mpsc::channel(config.intake_capacity);
        let (unregister_tx, unregister_rx) = mpsc::channel(config.intake_capacity);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(config.intake_capacity);
        let (members_tx, members) = watch::channel(0);
        let stop = CancellationToken::new();

        let hub = Hub {
            register_tx,
            unregister_tx,
            broadcast_tx,
            members,
            stop: stop.clone(),
            send_queue_capacity: config.send_queue_capacity,
        };

        let hub_loop = HubLoop {
            register_rx,
            unregister_rx,
            broadcast_rx,
            registry: Registry::new(members_tx),
            stop,
            span: tracing::info_span!("hub", room = %config.room),
        };

        (hub, hub_loop)
    }

    /// Create a hub and run its loop on a new task until `shutdown` fires or
    /// [`Hub::shutdown`] is called.
    pub fn spawn(config: HubConfig, shutdown: CancellationToken) -> (Hub, JoinHandle<()>) {
        let (hub, hub_loop) = Hub::new(config);
        let handle = tokio::spawn(hub_loop.run(shutdown));
        (hub, handle)
    }

    /// Create a subscriber sized for this hub. Nothing is registered yet.
    pub fn subscriber(&self) -> (Subscriber, Outbox) {
        subscriber::channel(self.send_queue_capacity)
    }

    /// Submit a subscriber for admission.
    pub async fn register(&self, subscriber: Subscriber) -> Result<(), HubError> {
        self.register_tx
            .send(subscriber)
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Submit a subscriber for removal. Removing a subscriber that is not a
    /// member is a no-op.
    pub async fn unregister(&self, id: SubscriberId) -> Result<(), HubError> {
        self.unregister_tx
            .send(id)
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Submit removal without waiting, for use from `Drop`.
    ///
    /// Falls back to a spawned task when the intake is momentarily full.
    pub fn unregister_detached(&self, id: SubscriberId) {
        match self.unregister_tx.try_send(id) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(id)) => {
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    let hub = self.clone();
                    runtime.spawn(async move {
                        let _ = hub.unregister(id).await;
                    });
                }
            }
        }
    }

    /// Submit a message for fan-out to every current member.
    pub async fn broadcast(&self, message: impl Into<Bytes>) -> Result<(), HubError> {
        self.broadcast_tx
            .send(message.into())
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Stop the event loop. Every member is evicted and its queue closed.
    pub fn shutdown(&self) {
        self.stop.cancel();
    }

    /// Whether the event loop is still accepting intents
    pub fn is_running(&self) -> bool {
        !self.register_tx.is_closed()
    }

    /// Current number of registered subscribers
    pub fn members(&self) -> usize {
        *self.members.borrow()
    }

    /// Watch the member count as the loop publishes it
    pub fn watch_members(&self) -> watch::Receiver<usize> {
        self.members.clone()
    }
}

impl HubLoop {
    /// Run the event loop until `shutdown` fires, [`Hub::shutdown`] is
    /// called, or every hub handle is dropped.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let span = self.span.clone();

        async move {
            tracing::info!("Hub started");

            loop {
                match self.next_event(&shutdown).await {
                    Event::Register(subscriber) => self.registry.admit(subscriber),
                    Event::Unregister(id) => self.registry.remove(id),
                    Event::Broadcast(message) => {
                        self.registry.fan_out(message);
                    }
                    Event::Stop => break,
                }
            }

            self.close_intakes();
            let evicted = self.registry.evict_all();
            tracing::info!(evicted, "Hub stopped");
        }
        .instrument(span)
        .await
    }

    /// Intake priority: register, then unregister, then broadcast.
    async fn next_event(&mut self, shutdown: &CancellationToken) -> Event {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => Event::Stop,
            _ = self.stop.cancelled() => Event::Stop,
            subscriber = self.register_rx.recv() => {
                subscriber.map_or(Event::Stop, Event::Register)
            }
            id = self.unregister_rx.recv() => id.map_or(Event::Stop, Event::Unregister),
            message = self.broadcast_rx.recv() => {
                message.map_or(Event::Stop, Event::Broadcast)
            }
        }
    }

    /// Refuse new intents and close any subscriber still waiting in the
    /// register intake.
    fn close_intakes(&mut self) {
        self.register_rx.close();
        self.unregister_rx.close();
        self.broadcast_rx.close();

        while let Ok(subscriber) = self.register_rx.try_recv() {
            subscriber.close();
        }
    }
}

/// Outcome of one fan-out pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct FanOut {
    delivered: usize,
    evicted: usize,
}

/// Membership set owned by the hub loop
struct Registry {
    members: HashMap<SubscriberId, Subscriber>,
    count: watch::Sender<usize>,
}

impl Registry {
    fn new(count: watch::Sender<usize>) -> Self {
        Self {
            members: HashMap::new(),
            count,
        }
    }

    fn admit(&mut self, subscriber: Subscriber) {
        let id = subscriber.id();
        if self.members.contains_key(&id) {
            tracing::warn!(subscriber = %id, "Duplicate registration ignored");
            subscriber.close();
            return;
        }

        self.members.insert(id, subscriber);
        self.publish();
        tracing::debug!(subscriber = %id, members = self.members.len(), "Subscriber registered");
    }

    fn remove(&mut self, id: SubscriberId) {
        if let Some(subscriber) = self.members.remove(&id) {
            subscriber.close();
            self.publish();
            tracing::debug!(subscriber = %id, members = self.members.len(), "Subscriber unregistered");
        }
    }

    fn fan_out(&mut self, message: Bytes) -> FanOut {
        let mut outcome = FanOut::default();
        let mut dead = Vec::new();

        for (id, subscriber) in &self.members {
            match subscriber.try_deliver(message.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(Undeliverable::SlowConsumer) => {
                    tracing::warn!(subscriber = %id, "Outbound queue full, evicting subscriber");
                    dead.push(*id);
                }
                Err(Undeliverable::Disconnected) => {
                    tracing::debug!(subscriber = %id, "Outbound pump gone, evicting subscriber");
                    dead.push(*id);
                }
            }
        }

        for id in dead {
            if let Some(subscriber) = self.members.remove(&id) {
                subscriber.close();
                outcome.evicted += 1;
            }
        }

        if outcome.evicted > 0 {
            self.publish();
        }

        tracing::trace!(
            delivered = outcome.delivered,
            evicted = outcome.evicted,
            "Broadcast"
        );

        outcome
    }

    fn evict_all(&mut self) -> usize {
        let evicted = self.members.len();
        for (_, subscriber) in self.members.drain() {
            subscriber.close();
        }
        self.publish();
        evicted
    }

    fn publish(&self) {
        self.count.send_replace(self.members.len());
    }
}
