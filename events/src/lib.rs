//! Event system infrastructure for the OmniHome backend.
//!
//! This crate provides the event system that enables loose coupling between
//! the request-handling layer (which decides *when* something happened) and
//! infrastructure concerns like pushing real-time updates to connected clients.
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum representing all home-automation events in the system
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates, avoiding circular
//! dependencies. Resource state is carried as serialized JSON values.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Channel names clients subscribe to. One per `DomainEvent` variant.
pub mod channel {
    pub const SECURITY_STATUS_CHANGED: &str = "security.status.changed";
    pub const SECURITY_ALARM_TRIGGERED: &str = "security.alarm.triggered";
    pub const CLIMATE_STATUS_CHANGED: &str = "climate.status.changed";
    pub const GARDEN_ZONE_CHANGED: &str = "garden.zone.changed";
    pub const LIGHTING_STATUS_CHANGED: &str = "lighting.status.changed";
    pub const ACTIVITY_LOG_NEW: &str = "activity.log.new";
    pub const CAMERA_MOTION_DETECTED: &str = "camera.motion.detected";

    /// Every channel the backend raises events on.
    pub const ALL: [&str; 7] = [
        SECURITY_STATUS_CHANGED,
        SECURITY_ALARM_TRIGGERED,
        CLIMATE_STATUS_CHANGED,
        GARDEN_ZONE_CHANGED,
        LIGHTING_STATUS_CHANGED,
        ACTIVITY_LOG_NEW,
        CAMERA_MOTION_DETECTED,
    ];
}

/// Domain events that represent state changes of the home.
/// These events are emitted after the persistence layer has committed the change.
///
/// The payload is the serialized resource as the REST layer would return it,
/// carried as `serde_json::Value` so this crate stays free of model types.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// The security system was armed, disarmed or changed mode.
    SecurityStatusChanged { data: Value },
    /// A sensor tripped while the system was armed.
    SecurityAlarmTriggered { data: Value },
    /// Thermostat mode, target or measured temperature changed.
    ClimateStatusChanged { data: Value },
    /// An irrigation zone started or stopped watering.
    GardenZoneChanged { data: Value },
    /// A light or room lighting scene changed.
    LightingStatusChanged { data: Value },
    /// A new entry was appended to the activity log.
    ActivityLogNew { data: Value },
    /// A camera reported motion.
    CameraMotionDetected { data: Value },
}

impl DomainEvent {
    /// The channel this event is broadcast on.
    pub fn channel(&self) -> &'static str {
        match self {
            DomainEvent::SecurityStatusChanged { .. } => channel::SECURITY_STATUS_CHANGED,
            DomainEvent::SecurityAlarmTriggered { .. } => channel::SECURITY_ALARM_TRIGGERED,
            DomainEvent::ClimateStatusChanged { .. } => channel::CLIMATE_STATUS_CHANGED,
            DomainEvent::GardenZoneChanged { .. } => channel::GARDEN_ZONE_CHANGED,
            DomainEvent::LightingStatusChanged { .. } => channel::LIGHTING_STATUS_CHANGED,
            DomainEvent::ActivityLogNew { .. } => channel::ACTIVITY_LOG_NEW,
            DomainEvent::CameraMotionDetected { .. } => channel::CAMERA_MOTION_DETECTED,
        }
    }

    pub fn payload(&self) -> &Value {
        match self {
            DomainEvent::SecurityStatusChanged { data }
            | DomainEvent::SecurityAlarmTriggered { data }
            | DomainEvent::ClimateStatusChanged { data }
            | DomainEvent::GardenZoneChanged { data }
            | DomainEvent::LightingStatusChanged { data }
            | DomainEvent::ActivityLogNew { data }
            | DomainEvent::CameraMotionDetected { data } => data,
        }
    }
}

/// Trait for handling domain events.
/// Implementations can perform side effects like pushing notifications,
/// updating caches, logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    /// Handlers are called sequentially and never report failure back to the caller.
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<(&'static str, Value)>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: &DomainEvent) {
            self.seen
                .lock()
                .unwrap()
                .push((event.channel(), event.payload().clone()));
        }
    }

    #[test]
    fn test_each_variant_maps_to_its_channel() {
        let data = json!({});
        let events = [
            DomainEvent::SecurityStatusChanged { data: data.clone() },
            DomainEvent::SecurityAlarmTriggered { data: data.clone() },
            DomainEvent::ClimateStatusChanged { data: data.clone() },
            DomainEvent::GardenZoneChanged { data: data.clone() },
            DomainEvent::LightingStatusChanged { data: data.clone() },
            DomainEvent::ActivityLogNew { data: data.clone() },
            DomainEvent::CameraMotionDetected { data },
        ];

        let channels: Vec<&str> = events.iter().map(DomainEvent::channel).collect();
        assert_eq!(channels, channel::ALL);
    }

    #[tokio::test]
    async fn test_publish_reaches_handlers_in_registration_order() {
        let first = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let second = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let publisher = EventPublisher::new()
            .with_handler(first.clone())
            .with_handler(second.clone());
        assert_eq!(publisher.handler_count(), 2);

        publisher
            .publish(DomainEvent::GardenZoneChanged {
                data: json!({"zone_id": "z1", "is_watering": true}),
            })
            .await;

        for recorder in [first, second] {
            let seen = recorder.seen.lock().unwrap();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].0, "garden.zone.changed");
            assert_eq!(seen[0].1["zone_id"], "z1");
        }
    }

    #[tokio::test]
    async fn test_publish_without_handlers_is_a_no_op() {
        EventPublisher::default()
            .publish(DomainEvent::ActivityLogNew { data: Value::Null })
            .await;
    }
}
