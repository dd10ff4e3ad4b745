//! HTTP surface of the hub: the WebSocket endpoint, health and info routes,
//! the OpenAPI docs and the server's accept loop.

use hub::CloseReason;
use log::*;
use service::AppState;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

mod controller;
pub mod error;
mod params;
pub(crate) mod router;

pub use error::{Error, Result};
pub use router::define_routes;

/// Bind the configured interface and port and serve until Ctrl-C or SIGTERM.
pub async fn init_server(app_state: AppState) -> Result<()> {
    let interface = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{interface}:{}", app_state.config.port);

    let listener = TcpListener::bind(&addr).await.map_err(Error::bind)?;
    info!("Server starting... listening for connections on http://{addr}");

    serve(listener, app_state, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves. Every live hub
/// connection is then closed with code 1001 so that graceful shutdown is not held
/// open by long-lived sockets.
pub async fn serve<F>(listener: TcpListener, app_state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let hub_manager = Arc::clone(&app_state.hub_manager);
    let router = define_routes(app_state);

    let shutdown = async move {
        shutdown.await;
        info!("Shutdown requested, closing hub connections");
        hub_manager.shutdown(CloseReason::ServerShutdown);
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(Error::serve)?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
