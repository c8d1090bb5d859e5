//! WebSocket session lifecycle, from upgrade through detach.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use metrics::{counter, histogram};
use serde_json::json;
use taskhub_core::events::{CONNECTION_ESTABLISHED, UPDATE_TASK_NOTICE};
use taskhub_core::ids::ConnectionId;
use taskhub_core::Envelope;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::broadcast::{Broadcaster, NoticeOutcome};
use super::connection::ClientConnection;
use super::heartbeat::{HeartbeatResult, run_heartbeat};

const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-session tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Outbound queue depth.
    pub send_queue_capacity: usize,
    /// Ping cadence.
    pub heartbeat_interval: Duration,
    /// Silence tolerated before detaching.
    pub heartbeat_timeout: Duration,
}

/// What happened to one inbound text frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// Decoded and handed to the relay path.
    Notice(NoticeOutcome),
    /// Not a valid envelope; discarded.
    Malformed,
}

/// Decode an inbound frame and relay it if it is a client notice.
pub fn handle_inbound(text: &str, origin: &ConnectionId, broadcaster: &Broadcaster) -> Inbound {
    let envelope = match Envelope::parse(text) {
        Ok(env) => env,
        Err(e) => {
            warn!(conn_id = %origin, error = %e, "discarding malformed frame");
            counter!("taskhub_ws_malformed_frames_total").increment(1);
            return Inbound::Malformed;
        }
    };
    if envelope.kind != UPDATE_TASK_NOTICE {
        debug!(conn_id = %origin, kind = %envelope.kind, "ignoring client frame");
    }
    Inbound::Notice(broadcaster.relay_notice(origin, &envelope))
}

fn hello_frame(id: &ConnectionId) -> Option<Arc<String>> {
    let hello = Envelope::new(CONNECTION_ESTABLISHED, json!({ "connectionId": id }));
    hello.to_json().ok().map(Arc::new)
}

/// Run one client session.
///
/// The greeting is queued before the connection joins the broadcaster, so it
/// is always the first frame the client sees. The session ends when the
/// client closes, the socket errors in either direction, the heartbeat times
/// out, the broadcaster evicts the connection, or `shutdown` fires.
#[instrument(skip_all, fields(conn_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    origin: Option<String>,
    broadcaster: Arc<Broadcaster>,
    config: SessionConfig,
    shutdown: CancellationToken,
) {
    let (ws_tx, ws_rx) = ws.split();
    run_session(ws_tx, ws_rx, origin, broadcaster, config, shutdown).await;
}

/// Forward queued frames and pings until the queue closes, the connection
/// is closed, or a write fails. A failed write closes the connection.
async fn run_writer<S>(
    mut ws_tx: S,
    mut send_rx: mpsc::Receiver<Arc<String>>,
    closed: CancellationToken,
    ping_interval: Duration,
) where
    S: Sink<Message> + Unpin,
{
    let mut ping =
        tokio::time::interval_at(tokio::time::Instant::now() + ping_interval, ping_interval);
    loop {
        tokio::select! {
            biased;
            msg = send_rx.recv() => {
                let Some(text) = msg else { break };
                if ws_tx.send(Message::Text(text.as_str().to_owned().into())).await.is_err() {
                    debug!("socket write failed");
                    closed.cancel();
                    break;
                }
            }
            () = closed.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
            _ = ping.tick() => {
                if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    debug!("ping write failed");
                    closed.cancel();
                    break;
                }
            }
        }
    }
}

async fn run_session<S, R, E>(
    ws_tx: S,
    mut ws_rx: R,
    origin: Option<String>,
    broadcaster: Arc<Broadcaster>,
    config: SessionConfig,
    shutdown: CancellationToken,
) where
    S: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    let id = ConnectionId::new();
    let _ = tracing::Span::current().record("conn_id", id.as_str());

    let (send_tx, send_rx) = mpsc::channel::<Arc<String>>(config.send_queue_capacity.max(1));
    let closed = shutdown.child_token();
    let connection = Arc::new(ClientConnection::new(id.clone(), send_tx, origin, closed.clone()));

    if let Some(hello) = hello_frame(&id) {
        let _ = connection.send(hello);
    }
    if let Err(e) = broadcaster.attach(Arc::clone(&connection)) {
        warn!(error = %e, "attach failed");
        return;
    }
    counter!("taskhub_ws_connections_total").increment(1);
    info!(origin = ?connection.origin, "client connected");

    let mut writer = tokio::spawn(run_writer(
        ws_tx,
        send_rx,
        closed.clone(),
        config.heartbeat_interval,
    ));

    let heartbeat = {
        let conn = Arc::clone(&connection);
        let broadcaster = Arc::clone(&broadcaster);
        let cancel = closed.clone();
        let (interval, timeout) = (config.heartbeat_interval, config.heartbeat_timeout);
        tokio::spawn(async move {
            if run_heartbeat(Arc::clone(&conn), interval, timeout, cancel).await
                == HeartbeatResult::TimedOut
            {
                warn!(conn_id = %conn.id, silent = ?conn.last_pong_elapsed(), "heartbeat timed out");
                let _ = broadcaster.detach(&conn.id);
            }
        })
    };

    loop {
        let frame = tokio::select! {
            frame = ws_rx.next() => frame,
            () = closed.cancelled() => break,
        };
        let msg = match frame {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                debug!(error = %e, "socket read failed");
                break;
            }
            None => break,
        };
        connection.mark_alive();
        match msg {
            Message::Text(text) => {
                let _ = handle_inbound(text.as_str(), &id, &broadcaster);
            }
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => {
                    let _ = handle_inbound(text, &id, &broadcaster);
                }
                Err(_) => warn!(len = data.len(), "discarding non-UTF-8 binary frame"),
            },
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    let _ = broadcaster.detach(&id);
    closed.cancel();
    heartbeat.abort();
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }
    histogram!("taskhub_ws_connection_duration_seconds").record(connection.age().as_secs_f64());
    info!(dropped = connection.drop_count(), "client disconnected");
}
