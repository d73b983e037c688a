//! WebSocket handler for the relay loop.
//!
//! Owns the transport side of a relay session: protocol upgrade, the
//! per-connection writer task, the receive loop, and the idle-keepalive
//! probe. Relay semantics live in the beacon-relay crate.

use std::net::SocketAddr;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use beacon_relay::{Frame, FrameSender, ServerEnvelope, Session, SessionEnd};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::routes::health;
use crate::AppState;

const SERVICE_NAME: &str = "Beacon Signaling Server";

/// `GET /ws` - dedicated WebSocket endpoint.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    upgrade(ws, addr, state)
}

/// Extracts a `WebSocketUpgrade` when the request carries one, yielding
/// `None` otherwise instead of rejecting. axum 0.8 dropped the blanket
/// `Option<T: FromRequestParts>` extractor (it now needs
/// `OptionalFromRequestParts`, which `WebSocketUpgrade` doesn't implement),
/// so this local wrapper restores the optional-extraction the handler relies
/// on.
pub(crate) struct OptionalUpgrade(Option<WebSocketUpgrade>);

impl<S> FromRequestParts<S> for OptionalUpgrade
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalUpgrade(
            WebSocketUpgrade::from_request_parts(parts, state).await.ok(),
        ))
    }
}

/// `GET /` - upgrade requests become relay sessions; plain requests are
/// answered with the banner and never reach the registry.
pub async fn root_handler(
    OptionalUpgrade(ws): OptionalUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    match ws {
        Some(ws) => upgrade(ws, addr, state),
        None => health::banner().await.into_response(),
    }
}

fn upgrade(ws: WebSocketUpgrade, addr: SocketAddr, state: AppState) -> Response {
    ws.max_message_size(state.config.max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state, addr))
        .into_response()
}

/// Drive one relay session over an established WebSocket.
///
/// This function:
/// 1. Splits the socket and spawns the writer task
/// 2. Opens the session (registers the connection) and greets the client
/// 3. Runs the receive loop with the idle-keepalive probe
/// 4. Finishes the session on exit, which deregisters the connection
async fn handle_socket(socket: WebSocket, state: AppState, addr: SocketAddr) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Broadcast sends from other sessions land on this channel without
    // ever awaiting this peer.
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

    let session = Session::open(state.registry.clone(), addr.to_string(), tx.clone());
    let conn_id = session.id().clone();

    tracing::info!(conn_id = %conn_id, remote = %addr, "WebSocket client connected");

    send_envelope(&tx, ServerEnvelope::welcome(SERVICE_NAME));

    // Writer task: the only place that touches the sink.
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let message = match frame {
                Frame::Text(text) => Message::Text(text.into()),
                Frame::Binary(bytes) => Message::Binary(bytes.into()),
                Frame::Ping(payload) => Message::Ping(payload.into()),
            };
            if ws_sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut probe = tokio::time::interval_at(
        Instant::now() + state.config.keepalive_interval,
        state.config.keepalive_interval,
    );
    // Deadline of the probe currently awaiting acknowledgement, if any.
    let mut pong_due: Option<Instant> = None;

    let end = loop {
        let pong_deadline = {
            let due = pong_due;
            async move {
                match due {
                    Some(due) => tokio::time::sleep_until(due).await,
                    None => std::future::pending::<()>().await,
                }
            }
        };

        tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = session.handle_text(text.as_str()) {
                        send_envelope(&tx, reply);
                    }
                }
                Some(Ok(Message::Binary(bytes))) => {
                    session.handle_binary(bytes.to_vec());
                }
                Some(Ok(Message::Ping(data))) => {
                    // The pong reply is produced by the WebSocket layer
                    tracing::trace!(conn_id = %conn_id, "received ping: {} bytes", data.len());
                }
                Some(Ok(Message::Pong(_))) => {
                    pong_due = None;
                }
                Some(Ok(Message::Close(_))) | None => {
                    break SessionEnd::ClosedNormally;
                }
                Some(Err(e)) => {
                    break SessionEnd::ClosedWithError(e.to_string());
                }
            },
            _ = probe.tick() => {
                // One probe in flight at a time
                if pong_due.is_none() {
                    pong_due = Some(Instant::now() + state.config.keepalive_timeout);
                    let _ = tx.send(Frame::Ping(Vec::new()));
                }
            }
            _ = pong_deadline => {
                // Dead peer: expected closure, not a session fault
                tracing::info!(conn_id = %conn_id, "keepalive probe unacknowledged, terminating");
                break SessionEnd::ClosedNormally;
            }
        }
    };

    session.finish(end);
    send_task.abort();

    tracing::info!(
        conn_id = %conn_id,
        remote = %addr,
        active_connections = state.registry.connection_count(),
        "WebSocket client disconnected"
    );
}

/// Serialize a server envelope onto this connection's writer channel.
fn send_envelope(tx: &FrameSender, envelope: ServerEnvelope) {
    match serde_json::to_string(&envelope) {
        Ok(text) => {
            let _ = tx.send(Frame::Text(text));
        }
        Err(e) => {
            tracing::error!("Failed to serialize server envelope: {}", e);
        }
    }
}
