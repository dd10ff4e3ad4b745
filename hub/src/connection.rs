use crate::auth::UserId;
use crate::error::{DeliveryErrorKind, Error, ErrorKind, RegistryErrorKind};
use crate::lifecycle::CloseReason;
use axum::extract::ws::Utf8Bytes;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

/// Unique identifier for a connection (server-generated, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One live client session as seen by the rest of the hub.
///
/// The transport itself is owned by the session's tasks; the hub only holds the
/// sending half of the bounded outbound queue, which is safe to push to from any
/// task. The `state` watch doubles as the liveness flag: `None` while live,
/// `Some(reason)` once teardown has been requested.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    user_id: UserId,
    sender: mpsc::Sender<Utf8Bytes>,
    state: watch::Sender<Option<CloseReason>>,
    connected_at: Instant,
}

impl Connection {
    fn new(id: ConnectionId, user_id: UserId, sender: mpsc::Sender<Utf8Bytes>) -> Self {
        Self {
            id,
            user_id,
            sender,
            state: watch::channel(None).0,
            connected_at: Instant::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    pub fn is_alive(&self) -> bool {
        self.state.borrow().is_none()
    }

    /// The reason teardown was requested with, if it has been.
    pub fn close_reason(&self) -> Option<CloseReason> {
        *self.state.borrow()
    }

    /// Push a serialized frame onto the outbound queue without waiting.
    ///
    /// A full queue means the client is not draining its frames fast enough.
    pub fn deliver(&self, frame: Utf8Bytes) -> Result<(), Error> {
        if !self.is_alive() {
            return Err(delivery_error(DeliveryErrorKind::Closed));
        }

        self.sender.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => delivery_error(DeliveryErrorKind::QueueFull),
            TrySendError::Closed(_) => delivery_error(DeliveryErrorKind::Closed),
        })
    }

    /// Request teardown. Only the first call records its reason; returns whether
    /// this call was the one that closed the connection.
    pub(crate) fn close(&self, reason: CloseReason) -> bool {
        self.state.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        })
    }

    /// Resolves once teardown has been requested, with the recorded reason.
    pub async fn closed(&self) -> CloseReason {
        let mut rx = self.state.subscribe();
        let reason = rx.wait_for(Option::is_some).await.ok().and_then(|r| *r);
        reason.unwrap_or(CloseReason::ServerShutdown)
    }
}

fn delivery_error(kind: DeliveryErrorKind) -> Error {
    Error {
        source: None,
        error_kind: ErrorKind::Delivery(kind),
    }
}

struct RegistryEntry {
    connection: Arc<Connection>,
    subscriptions: BTreeSet<String>,
}

/// Live connections and, for each, the channels it is subscribed to.
///
/// Not synchronized on its own: the `Manager` owns it together with the
/// `ChannelIndex` behind a single lock so both sides always change together.
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, RegistryEntry>,
    next_id: u64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub(crate) fn starting_at(next_id: u64) -> Self {
        Self {
            connections: HashMap::new(),
            next_id,
        }
    }

    /// Admit a connection with an empty subscription set.
    pub fn register(
        &mut self,
        user_id: UserId,
        sender: mpsc::Sender<Utf8Bytes>,
    ) -> Result<Arc<Connection>, Error> {
        let id = ConnectionId(self.next_id);
        self.next_id = self.next_id.checked_add(1).ok_or_else(|| Error {
            source: Some("connection identifier space exhausted".into()),
            error_kind: ErrorKind::Registry(RegistryErrorKind::IdSpaceExhausted),
        })?;

        let connection = Arc::new(Connection::new(id, user_id, sender));
        self.connections.insert(
            id,
            RegistryEntry {
                connection: Arc::clone(&connection),
                subscriptions: BTreeSet::new(),
            },
        );

        Ok(connection)
    }

    /// Remove a connection, returning it with the channels it was subscribed to.
    /// Unknown ids are a no-op.
    pub fn unregister(
        &mut self,
        connection_id: &ConnectionId,
    ) -> Option<(Arc<Connection>, BTreeSet<String>)> {
        self.connections
            .remove(connection_id)
            .map(|entry| (entry.connection, entry.subscriptions))
    }

    pub fn lookup(&self, connection_id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections
            .get(connection_id)
            .map(|entry| Arc::clone(&entry.connection))
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    /// Snapshot of a connection's subscriptions; `None` if it is not registered.
    pub fn subscriptions_of(&self, connection_id: &ConnectionId) -> Option<BTreeSet<String>> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.subscriptions.clone())
    }

    /// Record a subscription. `None` if the connection is unknown, otherwise
    /// whether the channel was newly added.
    pub(crate) fn add_subscription(
        &mut self,
        connection_id: &ConnectionId,
        channel: &str,
    ) -> Option<bool> {
        self.connections
            .get_mut(connection_id)
            .map(|entry| entry.subscriptions.insert(channel.to_string()))
    }

    pub(crate) fn remove_subscription(
        &mut self,
        connection_id: &ConnectionId,
        channel: &str,
    ) -> Option<bool> {
        self.connections
            .get_mut(connection_id)
            .map(|entry| entry.subscriptions.remove(channel))
    }

    pub fn ids(&self) -> impl Iterator<Item = &ConnectionId> {
        self.connections.keys()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
