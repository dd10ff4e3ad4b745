use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use service::AppState;
use utoipa::ToSchema;

const SERVICE_NAME: &str = "omnihome-api";

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct HealthStatus {
    status: String,
    service: String,
    version: String,
    /// Currently registered hub connections
    connections: usize,
    /// Channels with at least one subscriber
    channels: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct ApiInfo {
    message: String,
    version: String,
}

/// GET the service health, including live hub statistics
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "API router is up and responding to requests", body = HealthStatus),
    )
)]
pub async fn health_check(State(app_state): State<AppState>) -> impl IntoResponse {
    let hub = app_state.hub_manager_ref();
    let body = HealthStatus {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: hub.connection_count(),
        channels: hub.channel_count(),
    };
    (StatusCode::OK, Json(body))
}

/// GET basic information about the API
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "API name and version", body = ApiInfo),
    )
)]
pub async fn root() -> impl IntoResponse {
    Json(ApiInfo {
        message: "OmniHome Smart Home API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
