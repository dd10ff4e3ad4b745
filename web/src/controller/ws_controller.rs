use crate::params::ws::ConnectParams;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum::response::IntoResponse;
use futures::StreamExt;
use hub::SessionContext;
use log::*;
use service::AppState;

/// GET upgrade to a hub WebSocket connection
///
/// The upgrade is always accepted. A missing or invalid token is reported
/// afterwards by closing the socket with code 4001.
#[utoipa::path(
    get,
    path = "/ws",
    params(ConnectParams),
    responses(
        (status = 101, description = "Switching protocols to a hub WebSocket connection"),
        (status = 400, description = "Request is not a WebSocket upgrade"),
    )
)]
pub async fn connect(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let credential = credential_from(params, &headers);
    let sessions = app_state.sessions.clone();

    ws.on_upgrade(move |socket| serve_socket(socket, sessions, credential))
}

async fn serve_socket(socket: WebSocket, sessions: SessionContext, credential: Option<String>) {
    let (ws_tx, ws_rx) = socket.split();
    let reason = sessions.run(ws_tx, ws_rx, credential).await;
    debug!("WebSocket session ended: {}", reason.description());
}

/// The `token` query parameter, falling back to an `Authorization: Bearer` header.
fn credential_from(params: ConnectParams, headers: &HeaderMap) -> Option<String> {
    params
        .token
        .filter(|token| !token.is_empty())
        .or_else(|| bearer_token(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn params(token: Option<&str>) -> ConnectParams {
        ConnectParams {
            token: token.map(str::to_string),
        }
    }

    fn bearer(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_query_token_is_used() {
        let credential = credential_from(params(Some("abc")), &HeaderMap::new());
        assert_eq!(credential.as_deref(), Some("abc"));
    }

    #[test]
    fn test_query_token_wins_over_header() {
        let credential = credential_from(params(Some("from-query")), &bearer("Bearer from-header"));
        assert_eq!(credential.as_deref(), Some("from-query"));
    }

    #[test]
    fn test_bearer_header_is_the_fallback() {
        let credential = credential_from(params(None), &bearer("Bearer from-header"));
        assert_eq!(credential.as_deref(), Some("from-header"));

        let credential = credential_from(params(Some("")), &bearer("Bearer from-header"));
        assert_eq!(credential.as_deref(), Some("from-header"));
    }

    #[test]
    fn test_non_bearer_authorization_is_ignored() {
        assert_eq!(credential_from(params(None), &bearer("Basic dXNlcg==")), None);
        assert_eq!(credential_from(params(None), &bearer("Bearer ")), None);
        assert_eq!(credential_from(params(None), &HeaderMap::new()), None);
    }
}
