//! `GET /ws` upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::header::ORIGIN;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::warn;

use super::session::{SessionConfig, run_ws_session};
use crate::server::AppState;

/// Upgrade to a WebSocket after checking the `Origin` header.
pub async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let origin = headers
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    if !state.config.origin_allowed(origin.as_deref()) {
        warn!(origin = ?origin, "websocket origin rejected");
        return (StatusCode::FORBIDDEN, "Origin not allowed").into_response();
    }
    if state.shutdown.is_cancelled() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let session = SessionConfig {
        send_queue_capacity: state.config.send_queue_capacity,
        heartbeat_interval: state.config.heartbeat_interval,
        heartbeat_timeout: state.config.heartbeat_timeout,
    };
    let broadcaster = state.broadcaster.clone();
    let shutdown = state.shutdown.clone();

    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, origin, broadcaster, session, shutdown))
}
