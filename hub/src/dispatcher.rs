use crate::lifecycle::CloseReason;
use crate::message::ServerMessage;
use crate::Manager;
use log::*;
use serde_json::Value;
use std::sync::Arc;

/// Outcome of a single fan-out, for logging and tests. Publishers never see it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FanOut {
    pub(crate) attempted: usize,
    pub(crate) delivered: usize,
    pub(crate) dropped: usize,
}

/// The one entry point the rest of the system uses to reach connected clients.
#[derive(Clone)]
pub struct Dispatcher {
    manager: Arc<Manager>,
}

impl Dispatcher {
    pub fn new(manager: Arc<Manager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// Deliver `payload` to every connection currently subscribed to `channel`.
    ///
    /// Best effort and fire-and-forget: never blocks on a recipient and never
    /// fails because of one. A recipient whose queue is full or closed is torn
    /// down instead of being retried.
    pub fn publish(&self, channel: &str, payload: &Value) {
        let fan_out = self.fan_out(channel, payload);
        if fan_out.attempted > 0 {
            debug!(
                "Published to {channel}: {} of {} subscriber(s) reached, {} dropped",
                fan_out.delivered, fan_out.attempted, fan_out.dropped
            );
        }
    }

    pub(crate) fn fan_out(&self, channel: &str, payload: &Value) -> FanOut {
        let recipients = self.manager.recipients_of(channel);
        if recipients.is_empty() {
            return FanOut::default();
        }

        let frame = match ServerMessage::event(channel, payload.clone()).to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to serialize event for channel {channel}: {e}");
                return FanOut::default();
            }
        };

        let mut fan_out = FanOut::default();
        for connection in recipients {
            // Raced with a disconnect after the snapshot was taken.
            if !connection.is_alive() {
                continue;
            }

            fan_out.attempted += 1;
            match connection.deliver(frame.clone()) {
                Ok(()) => fan_out.delivered += 1,
                Err(e) => {
                    fan_out.dropped += 1;
                    let reason = CloseReason::for_delivery_error(&e);
                    warn!(
                        "Failed to deliver {channel} to connection {}: {e}. Connection will be closed.",
                        connection.id()
                    );
                    self.manager.disconnect(&connection.id(), reason);
                }
            }
        }
        fan_out
    }
}
