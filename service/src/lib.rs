use config::Config;
use events::EventPublisher;
use hub::{Dispatcher, HubEventHandler, Manager, SessionContext, TokenVerifier};
use log::{info, warn};
use std::sync::Arc;

pub mod config;
pub mod logging;

// Service-level state shared by every request handler and every hub session.
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub hub_manager: Arc<Manager>,
    pub dispatcher: Dispatcher,
    pub event_publisher: EventPublisher,
    pub sessions: SessionContext,
}

impl AppState {
    pub fn new(app_config: Config, verifier: Arc<dyn TokenVerifier>) -> Self {
        if app_config.uses_default_jwt_secret() {
            if app_config.is_production() {
                warn!("JWT_SECRET_KEY is the built-in default; set a real secret in production");
            } else {
                info!("Using the default development JWT secret");
            }
        }

        let hub_manager = Arc::new(Manager::new());
        let dispatcher = Dispatcher::new(Arc::clone(&hub_manager));
        let event_publisher = EventPublisher::new()
            .with_handler(Arc::new(HubEventHandler::new(dispatcher.clone())));
        let sessions = SessionContext::new(
            Arc::clone(&hub_manager),
            verifier,
            app_config.session_settings(),
        );

        Self {
            config: app_config,
            hub_manager,
            dispatcher,
            event_publisher,
            sessions,
        }
    }

    pub fn hub_manager_ref(&self) -> &Manager {
        self.hub_manager.as_ref()
    }
}
