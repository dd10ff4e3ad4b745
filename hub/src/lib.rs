//! Real-time event broadcast hub.
//!
//! Clients hold a WebSocket open, authenticate once with a token, subscribe to
//! named channels, and receive every event published on those channels while
//! they stay connected.
//!
//! # Architecture
//!
//! - **Channels are implicit**: a channel exists while at least one connection
//!   is subscribed to it and disappears with its last subscriber.
//! - **One lock over registry and index**: the `Manager` keeps the connection
//!   registry and its inverse, the channel index, behind a single lock so the
//!   two never disagree, not even transiently.
//! - **Bounded outbound queues**: every connection has a bounded queue drained
//!   by its own sender task. Publishing only pushes onto queues; a full queue
//!   disconnects that one consumer instead of stalling the publisher.
//! - **Ephemeral events**: nothing is persisted or replayed. A client that is
//!   offline when an event fires misses it and reloads state over REST.
//!
//! # Message Flow
//!
//! 1. Client opens `/ws?token=...`; the session verifies the token through the
//!    `TokenVerifier` and registers the connection
//! 2. Client sends `{"event": "subscribe", "channels": [...]}` and gets a
//!    `subscribed` acknowledgement
//! 3. A domain change raises a `DomainEvent`; `HubEventHandler` hands it to
//!    `Dispatcher::publish(channel, payload)`
//! 4. The dispatcher snapshots the channel's subscribers and queues one
//!    `{"event": <channel>, "data": <payload>}` frame per live connection
//! 5. On disconnect (or a failed delivery) the connection leaves the registry
//!    and every channel in one step
//!
//! # Example: Publishing an event
//!
//! ```rust,ignore
//! use serde_json::json;
//!
//! app_state.dispatcher.publish("garden.zone.changed", &json!({
//!     "zone_id": zone.id,
//!     "is_watering": true,
//! }));
//! ```
//!
//! # Modules
//!
//! - `connection`: `ConnectionRegistry`, `Connection` handle and `ConnectionId`
//! - `channel`: `ChannelIndex`, the channel to subscribers mapping
//! - `manager`: synchronized owner of registry and index
//! - `dispatcher`: fan-out of published events
//! - `message`: wire format of control, acknowledgement and event frames
//! - `session`: per-connection lifecycle over a split WebSocket
//! - `lifecycle`: connection state machine and close reasons

pub mod auth;
pub mod channel;
pub mod connection;
pub mod dispatcher;
pub mod domain_event_handler;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod message;
pub mod session;

pub use auth::{TokenVerifier, UserId};
pub use dispatcher::Dispatcher;
pub use domain_event_handler::HubEventHandler;
pub use error::Error;
pub use lifecycle::CloseReason;
pub use manager::Manager;
pub use session::{SessionContext, SessionSettings};
