//! WebSocket listener for Foundry VTT clients.
//!
//! Each client keeps one WebSocket open and sends a JSON position message
//! per frame. Frames are handled in order per connection; connections run
//! as independent tasks. Nothing is ever sent back: a bad frame is logged
//! and dropped and the connection keeps going.
//!
//! ## Protocol
//!
//! ```json
//! {"name": "Alice", "fAvatarPosition": [1.0, 2.0, 3.0], "context": [1, 2]}
//! ```
//!
//! `GET /health` returns `ok`; `GET /status` reports link and client state.
//! Any other path is treated as a WebSocket upgrade.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use super::registry::ClientRegistry;
use crate::link::PositionMessage;
use crate::sink::UpdateSink;
use crate::{BridgeError, Result};

/// Longest payload prefix echoed into logs for a rejected frame.
const LOG_PAYLOAD_CHARS: usize = 200;

/// State shared by every connection.
#[derive(Debug)]
pub struct ListenerState {
    /// Writer of the link region.
    pub sink: Arc<UpdateSink>,
    /// Currently connected clients.
    pub clients: ClientRegistry,
    /// Largest inbound frame accepted.
    pub max_message_bytes: usize,
    /// Cancelled on shutdown; open connections close when it fires.
    pub shutdown: CancellationToken,
}

impl ListenerState {
    /// Build listener state around `sink`.
    #[must_use]
    pub fn new(sink: Arc<UpdateSink>, max_message_bytes: usize, shutdown: CancellationToken) -> Self {
        Self {
            sink,
            clients: ClientRegistry::new(),
            max_message_bytes,
            shutdown,
        }
    }
}

/// Handler for `GET /health`.
async fn health() -> &'static str {
    "ok"
}

/// Handler for `GET /status`.
async fn status(State(state): State<Arc<ListenerState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "linked": state.sink.is_linked(),
        "tick": state.sink.tick(),
        "clients": state.clients.len(),
    }))
}

async fn upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<ListenerState>>,
) -> Response {
    ws.max_message_size(state.max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, addr, state))
}

/// Build the HTTP router.
pub fn router(state: Arc<ListenerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .fallback(upgrade)
        .with_state(state)
}

/// Bind the listener socket.
///
/// # Errors
///
/// Returns `BridgeError::Transport` if the address cannot be bound.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .map_err(|err| BridgeError::Transport(format!("failed to bind {host}:{port}: {err}")))
}

/// Serve WebSocket clients on `listener` until `state.shutdown` fires.
///
/// # Errors
///
/// Returns `BridgeError::Transport` if the server fails.
pub async fn serve(listener: TcpListener, state: Arc<ListenerState>) -> Result<()> {
    let addr = listener
        .local_addr()
        .map_err(|err| BridgeError::Transport(format!("listener has no local address: {err}")))?;
    let ct = state.shutdown.clone();

    info!(%addr, "waiting for connections from Foundry VTT");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { ct.cancelled().await })
    .await
    .map_err(|err| BridgeError::Transport(format!("server error: {err}")))?;

    info!("listener shut down");
    Ok(())
}

/// Decode one payload and hand it to the sink.
///
/// # Errors
///
/// Returns `BridgeError::MalformedMessage` if the payload is not a
/// position message. Sink failures are logged by the sink itself.
pub fn handle_payload(sink: &UpdateSink, payload: &str) -> Result<()> {
    let message = PositionMessage::from_json(payload)?;
    sink.apply(&message);
    Ok(())
}

async fn handle_socket(mut socket: WebSocket, addr: SocketAddr, state: Arc<ListenerState>) {
    let client_id = state.clients.register(addr);
    let span = info_span!("ws_conn", %client_id, %addr);

    async move {
        info!(clients = state.clients.len(), "client connected");

        loop {
            let frame = tokio::select! {
                () = state.shutdown.cancelled() => break,
                frame = socket.recv() => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => process_frame(&state, text.as_str()),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => process_frame(&state, text),
                    Err(err) => warn!(%err, "binary frame is not utf-8; dropped"),
                },
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(err)) => {
                    warn!(%err, "websocket error");
                    break;
                }
            }
        }

        let connected_ms = state
            .clients
            .unregister(&client_id)
            .map_or(0, |client| client.connected_for().as_millis());
        info!(
            clients = state.clients.len(),
            connected_ms, "client disconnected"
        );
    }
    .instrument(span)
    .await;
}

fn process_frame(state: &ListenerState, payload: &str) {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return;
    }

    match handle_payload(&state.sink, trimmed) {
        Ok(()) => {}
        Err(BridgeError::MalformedMessage(reason)) => {
            let preview: String = trimmed.chars().take(LOG_PAYLOAD_CHARS).collect();
            warn!(%reason, payload = %preview, "invalid message dropped");
        }
        Err(err) => error!(%err, "error processing message"),
    }
}
