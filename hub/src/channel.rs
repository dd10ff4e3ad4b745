use crate::connection::ConnectionId;
use std::collections::{HashMap, HashSet};

/// For each channel name, the connections currently subscribed to it.
///
/// Channels have no registration step: an entry appears with its first
/// subscriber and is dropped as soon as the last one leaves, so transient
/// topics do not accumulate.
#[derive(Debug, Default)]
pub struct ChannelIndex {
    channels: HashMap<String, HashSet<ConnectionId>>,
}

impl ChannelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the connection was newly added to the channel.
    pub fn add(&mut self, channel: &str, connection_id: ConnectionId) -> bool {
        match self.channels.get_mut(channel) {
            Some(subscribers) => subscribers.insert(connection_id),
            None => {
                self.channels
                    .insert(channel.to_string(), HashSet::from([connection_id]));
                true
            }
        }
    }

    /// Returns whether the connection was subscribed. Empty entries are removed.
    pub fn remove(&mut self, channel: &str, connection_id: &ConnectionId) -> bool {
        let Some(subscribers) = self.channels.get_mut(channel) else {
            return false;
        };

        let removed = subscribers.remove(connection_id);
        if subscribers.is_empty() {
            self.channels.remove(channel);
        }
        removed
    }

    /// Point-in-time copy of a channel's subscribers.
    pub fn subscribers_of(&self, channel: &str) -> Vec<ConnectionId> {
        self.channels
            .get(channel)
            .map(|subscribers| subscribers.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains_channel(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, HashSet::len)
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
