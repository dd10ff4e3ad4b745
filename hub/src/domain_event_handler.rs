use crate::Dispatcher;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;

/// Handles domain events by publishing them on their channel.
///
/// The request-handling layer decides *when* an event fires and what its
/// payload is; this handler only routes it to whoever is subscribed.
pub struct HubEventHandler {
    dispatcher: Dispatcher,
}

impl HubEventHandler {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl EventHandler for HubEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        debug!("Handling domain event for channel {}", event.channel());
        self.dispatcher.publish(event.channel(), event.payload());
    }
}
