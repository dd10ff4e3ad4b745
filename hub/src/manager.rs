use crate::auth::UserId;
use crate::channel::ChannelIndex;
use crate::connection::{Connection, ConnectionId, ConnectionRegistry};
use crate::error::Error;
use crate::lifecycle::CloseReason;
use axum::extract::ws::Utf8Bytes;
use log::*;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;

struct HubState {
    registry: ConnectionRegistry,
    index: ChannelIndex,
}

/// Owns the connection registry and the channel index.
///
/// Both live behind one lock: every mutation updates the two sides together and
/// every snapshot sees them in agreement, so a reader can never observe a
/// connection that is half removed. Nothing hands out the raw maps.
pub struct Manager {
    state: RwLock<HubState>,
}

impl Manager {
    pub fn new() -> Self {
        Self::with_registry(ConnectionRegistry::new())
    }

    pub(crate) fn with_registry(registry: ConnectionRegistry) -> Self {
        Self {
            state: RwLock::new(HubState {
                registry,
                index: ChannelIndex::new(),
            }),
        }
    }

    /// Register a new connection with no subscriptions.
    pub fn register_connection(
        &self,
        user_id: UserId,
        sender: mpsc::Sender<Utf8Bytes>,
    ) -> Result<Arc<Connection>, Error> {
        let connection = self.state.write().registry.register(user_id, sender)?;
        info!(
            "Registered connection {} for user {}",
            connection.id(),
            connection.user_id()
        );
        Ok(connection)
    }

    /// Remove a connection from the registry and from every channel it was in,
    /// then mark it closed with `reason`. Safe to call any number of times; only
    /// the first call does anything. Returns whether this call removed it.
    pub fn disconnect(&self, connection_id: &ConnectionId, reason: CloseReason) -> bool {
        let removed = {
            let mut state = self.state.write();
            let HubState { registry, index } = &mut *state;

            registry.unregister(connection_id).map(|(connection, channels)| {
                for channel in &channels {
                    index.remove(channel, connection_id);
                }
                connection.close(reason);
                (connection, channels.len())
            })
        };

        match removed {
            Some((connection, channel_count)) => {
                info!(
                    "Connection {} for user {} closed ({}) after {:?}, left {} channel(s)",
                    connection_id,
                    connection.user_id(),
                    reason.description(),
                    connection.age(),
                    channel_count
                );
                true
            }
            None => {
                trace!("Connection {connection_id} already removed");
                false
            }
        }
    }

    /// Subscribe a connection to `channels`. Returns its resulting subscription
    /// set, or `None` if the connection is no longer registered.
    pub fn subscribe(
        &self,
        connection_id: &ConnectionId,
        channels: &[String],
    ) -> Option<BTreeSet<String>> {
        let mut state = self.state.write();
        let HubState { registry, index } = &mut *state;

        if !registry.contains(connection_id) {
            return None;
        }
        for channel in channels {
            if registry.add_subscription(connection_id, channel) == Some(true) {
                index.add(channel, *connection_id);
            }
        }
        debug!("Connection {connection_id} subscribed to channels: {channels:?}");
        registry.subscriptions_of(connection_id)
    }

    /// Unsubscribe a connection from `channels`; channels it never subscribed to
    /// are ignored. Returns `None` if the connection is no longer registered.
    pub fn unsubscribe(
        &self,
        connection_id: &ConnectionId,
        channels: &[String],
    ) -> Option<BTreeSet<String>> {
        let mut state = self.state.write();
        let HubState { registry, index } = &mut *state;

        if !registry.contains(connection_id) {
            return None;
        }
        for channel in channels {
            if registry.remove_subscription(connection_id, channel) == Some(true) {
                index.remove(channel, connection_id);
            }
        }
        debug!("Connection {connection_id} unsubscribed from channels: {channels:?}");
        registry.subscriptions_of(connection_id)
    }

    pub fn lookup(&self, connection_id: &ConnectionId) -> Option<Arc<Connection>> {
        self.state.read().registry.lookup(connection_id)
    }

    /// Snapshot of a connection's subscriptions; empty if it is not registered.
    pub fn subscriptions_of(&self, connection_id: &ConnectionId) -> BTreeSet<String> {
        self.state
            .read()
            .registry
            .subscriptions_of(connection_id)
            .unwrap_or_default()
    }

    /// Point-in-time copy of a channel's subscribers.
    pub fn subscribers_of(&self, channel: &str) -> Vec<ConnectionId> {
        self.state.read().index.subscribers_of(channel)
    }

    /// Subscriber snapshot resolved to live connections under a single read
    /// lock. The lock is released before the caller delivers anything.
    pub(crate) fn recipients_of(&self, channel: &str) -> Vec<Arc<Connection>> {
        let state = self.state.read();
        state
            .index
            .subscribers_of(channel)
            .iter()
            .filter_map(|connection_id| state.registry.lookup(connection_id))
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.state.read().registry.len()
    }

    pub fn channel_count(&self) -> usize {
        self.state.read().index.len()
    }

    pub fn has_channel(&self, channel: &str) -> bool {
        self.state.read().index.contains_channel(channel)
    }

    /// Tear down every live connection. Returns how many were closed.
    pub fn shutdown(&self, reason: CloseReason) -> usize {
        let ids: Vec<ConnectionId> = self.state.read().registry.ids().copied().collect();
        let closed = ids
            .iter()
            .filter(|connection_id| self.disconnect(connection_id, reason))
            .count();
        info!("Closed {closed} connection(s) on shutdown");
        closed
    }

    /// Panics unless the registry and channel index agree with each other and no
    /// channel entry is empty.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let state = self.state.read();
        for channel in state.index.channels() {
            let subscribers = state.index.subscribers_of(channel);
            assert!(!subscribers.is_empty(), "empty channel entry {channel}");
            for connection_id in subscribers {
                let subscriptions = state
                    .registry
                    .subscriptions_of(&connection_id)
                    .unwrap_or_else(|| panic!("{connection_id} in {channel} is not registered"));
                assert!(subscriptions.contains(channel));
            }
        }
        for connection_id in state.registry.ids() {
            for channel in state.registry.subscriptions_of(connection_id).unwrap() {
                assert!(
                    state.index.subscribers_of(&channel).contains(connection_id),
                    "{connection_id} subscribed to {channel} but missing from the index"
                );
            }
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn connect(manager: &Manager, user: &str) -> (Arc<Connection>, mpsc::Receiver<Utf8Bytes>) {
        let (tx, rx) = mpsc::channel(8);
        (manager.register_connection(user.into(), tx).unwrap(), rx)
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let manager = Manager::new();
        let (a, _rx) = connect(&manager, "alice");

        manager.subscribe(&a.id(), &channels(&["x"]));
        let subscriptions = manager.subscribe(&a.id(), &channels(&["x"])).unwrap();

        assert_eq!(subscriptions, set(&["x"]));
        assert_eq!(manager.subscribers_of("x"), vec![a.id()]);
        manager.assert_consistent();
    }

    #[test]
    fn test_unsubscribe_from_unknown_channel_is_a_no_op() {
        let manager = Manager::new();
        let (a, _rx) = connect(&manager, "alice");
        manager.subscribe(&a.id(), &channels(&["x"]));

        let subscriptions = manager.unsubscribe(&a.id(), &channels(&["y"])).unwrap();

        assert_eq!(subscriptions, set(&["x"]));
        assert!(!manager.has_channel("y"));
        manager.assert_consistent();
    }

    #[test]
    fn test_subscription_set_follows_the_operation_sequence() {
        let manager = Manager::new();
        let (a, _rx) = connect(&manager, "alice");
        let id = a.id();

        manager.subscribe(&id, &channels(&["a", "b", "c"]));
        manager.unsubscribe(&id, &channels(&["b"]));
        manager.subscribe(&id, &channels(&["d", "a"]));
        manager.unsubscribe(&id, &channels(&["c", "z"]));

        assert_eq!(manager.subscriptions_of(&id), set(&["a", "d"]));
        assert_eq!(manager.channel_count(), 2);
        manager.assert_consistent();
    }

    #[test]
    fn test_last_unsubscribe_removes_channel_entry() {
        let manager = Manager::new();
        let (a, _rx) = connect(&manager, "alice");
        let (b, _rx_b) = connect(&manager, "bob");
        manager.subscribe(&a.id(), &channels(&["climate.status.changed"]));
        manager.subscribe(&b.id(), &channels(&["climate.status.changed"]));

        manager.unsubscribe(&a.id(), &channels(&["climate.status.changed"]));
        assert!(manager.has_channel("climate.status.changed"));

        manager.unsubscribe(&b.id(), &channels(&["climate.status.changed"]));
        assert!(!manager.has_channel("climate.status.changed"));
        manager.assert_consistent();
    }

    #[test]
    fn test_disconnect_removes_connection_from_every_channel() {
        let manager = Manager::new();
        let (a, _rx) = connect(&manager, "alice");
        let (b, _rx_b) = connect(&manager, "bob");
        manager.subscribe(&a.id(), &channels(&["x", "y"]));
        manager.subscribe(&b.id(), &channels(&["y"]));

        assert!(manager.disconnect(&a.id(), CloseReason::ClientClosed));

        assert!(manager.lookup(&a.id()).is_none());
        assert!(!manager.has_channel("x"));
        assert_eq!(manager.subscribers_of("y"), vec![b.id()]);
        assert!(manager.subscriptions_of(&a.id()).is_empty());
        assert_eq!(a.close_reason(), Some(CloseReason::ClientClosed));
        manager.assert_consistent();
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let manager = Manager::new();
        let (a, _rx) = connect(&manager, "alice");
        manager.subscribe(&a.id(), &channels(&["x"]));

        assert!(manager.disconnect(&a.id(), CloseReason::SlowConsumer));
        assert!(!manager.disconnect(&a.id(), CloseReason::ClientClosed));

        assert_eq!(a.close_reason(), Some(CloseReason::SlowConsumer));
        assert_eq!(manager.connection_count(), 0);
        manager.assert_consistent();
    }

    #[test]
    fn test_operations_on_removed_connection_report_none() {
        let manager = Manager::new();
        let (a, _rx) = connect(&manager, "alice");
        manager.disconnect(&a.id(), CloseReason::ClientClosed);

        assert!(manager.subscribe(&a.id(), &channels(&["x"])).is_none());
        assert!(manager.unsubscribe(&a.id(), &channels(&["x"])).is_none());
        assert!(!manager.has_channel("x"));
    }

    #[test]
    fn test_recipients_skip_nothing_while_consistent() {
        let manager = Manager::new();
        let (a, _rx) = connect(&manager, "alice");
        let (b, _rx_b) = connect(&manager, "bob");
        manager.subscribe(&a.id(), &channels(&["x"]));
        manager.subscribe(&b.id(), &channels(&["x"]));

        let mut ids: Vec<ConnectionId> = manager
            .recipients_of("x")
            .iter()
            .map(|connection| connection.id())
            .collect();
        ids.sort();

        assert_eq!(ids, vec![a.id(), b.id()]);
        assert!(manager.recipients_of("nobody").is_empty());
    }

    #[test]
    fn test_shutdown_closes_everything() {
        let manager = Manager::new();
        let (a, _rx) = connect(&manager, "alice");
        let (b, _rx_b) = connect(&manager, "bob");
        manager.subscribe(&a.id(), &channels(&["x"]));
        manager.subscribe(&b.id(), &channels(&["y"]));

        assert_eq!(manager.shutdown(CloseReason::ServerShutdown), 2);

        assert_eq!(manager.connection_count(), 0);
        assert_eq!(manager.channel_count(), 0);
        assert_eq!(b.close_reason(), Some(CloseReason::ServerShutdown));
    }

    #[test]
    fn test_concurrent_churn_keeps_registry_consistent() {
        let manager = Arc::new(Manager::new());
        let names = channels(&["a", "b", "c", "d"]);

        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let manager = Arc::clone(&manager);
                let names = names.clone();
                std::thread::spawn(move || {
                    let mut ids = Vec::new();
                    for round in 0..200 {
                        let (tx, _rx) = mpsc::channel(1);
                        let connection = manager
                            .register_connection(format!("user-{worker}"), tx)
                            .unwrap();
                        let id = connection.id();
                        let first = &names[round % names.len()];
                        let second = &names[(round + worker) % names.len()];
                        manager.subscribe(&id, &[first.clone(), second.clone()]);
                        manager.unsubscribe(&id, &[first.clone()]);
                        let _ = manager.recipients_of(second);
                        if round % 3 == 0 {
                            manager.disconnect(&id, CloseReason::ClientClosed);
                            manager.disconnect(&id, CloseReason::TransportError);
                        } else {
                            ids.push(id);
                        }
                    }
                    ids
                })
            })
            .collect();

        let mut survivors: Vec<ConnectionId> = workers
            .into_iter()
            .flat_map(|worker| worker.join().unwrap())
            .collect();

        manager.assert_consistent();
        let total = survivors.len();
        survivors.sort();
        survivors.dedup();
        assert_eq!(survivors.len(), total, "duplicate connection ids");
        assert_eq!(manager.connection_count(), total);

        for id in &survivors {
            manager.disconnect(id, CloseReason::ClientClosed);
        }
        assert_eq!(manager.channel_count(), 0);
    }
}
