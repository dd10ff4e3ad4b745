use domain::JwtVerifier;
use log::{error, info};
use service::{config::Config, logging::Logger, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting OmniHome event hub v{} [{}]",
        env!("CARGO_PKG_VERSION"),
        config.runtime_env()
    );

    let verifier = match JwtVerifier::from_config(&config) {
        Ok(verifier) => Arc::new(verifier),
        Err(e) => {
            error!("Failed to configure access token verification: {e}");
            std::process::exit(1);
        }
    };

    let app_state = AppState::new(config, verifier);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server exited with error: {e}");
        std::process::exit(1);
    }
}
