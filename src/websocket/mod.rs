//! WebSocket Chat Room
//!
//! Real-time message fan-out for a single room.
//!
//! ## Architecture
//!
//! - **Hub**: owns room membership; one serialized loop handles register,
//!   unregister and broadcast intents and fans messages out without ever
//!   blocking on a subscriber
//! - **Subscriber**: a connected peer's bounded outbound queue, split into a
//!   registry-side sender and a pump-side [`Outbox`]
//! - **Pumps**: per-connection inbound and outbound loops with read/write
//!   deadlines and Ping/Pong keepalive
//! - **Handler**: upgrades HTTP requests and wires connections into the hub
//!
//! ## Usage
//!
//! Clients connect to `/api/chatroom` and send text frames. Every frame is
//! normalized (line breaks folded into spaces, surrounding whitespace
//! trimmed) and delivered to every member of the room, the sender included.
//! Messages that arrive in a burst are delivered as one frame, separated by
//! `\n`.
//!
//! A subscriber whose outbound queue fills up is evicted and receives a Close
//! frame; it has to reconnect to resume.
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:5000/api/chatroom');
//!
//! ws.onmessage = (event) => {
//!   for (const line of event.data.split('\n')) {
//!     console.log('Received:', line);
//!   }
//! };
//!
//! ws.onopen = () => ws.send('hello');
//! ```

mod handler;
mod hub;
mod message;
mod pump;
mod subscriber;

pub use handler::{chatroom_handler, serve_connection};
pub use hub::{Hub, HubConfig, HubError, HubLoop};
pub use message::normalize;
pub use pump::{PumpConfig, PumpError};
pub use subscriber::{Outbox, Subscriber, SubscriberId};
