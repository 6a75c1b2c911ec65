//! Socket (WebSocket) adapter.
//!
//! Each accepted socket gets its own `SocketSession` that:
//! - Registers once under the session resolved at connect time
//! - Greets the client with a `system` frame
//! - Decodes inbound frames; `chat` starts a relay, `ping` gets a `pong`
//! - Answers malformed frames with an `error` envelope and keeps going
//! - On close cancels its own relays and unregisters
//!
//! Outbound frames never touch the socket directly: they go through the
//! registry into this connection's sink and a writer task drains it.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Socket errors end only this connection

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use agentmux_core::{ConnectionId, ExchangeRequest, SessionId};
use agentmux_protocol::{
    decode_client_frame, encode_server_frame, ClientFrame, ControlFrame, Envelope, FrameError,
};

use super::AppState;
use crate::registry::{ConnectionSink, OutboundFrame, RegistryHandle, SINK_CAPACITY, WRITE_TIMEOUT};
use crate::relay::{RelayOutcome, StreamRelay};

pub(crate) async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    upgrade(state, ws, None)
}

pub(crate) async fn ws_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(state, ws, Some(session_id))
}

fn upgrade(state: AppState, ws: WebSocketUpgrade, session_id: Option<String>) -> Response {
    let session_id = SessionId::resolve(session_id.as_deref());
    ws.on_upgrade(move |socket| SocketSession::new(state, session_id).run(socket))
}

/// One accepted socket.
pub struct SocketSession {
    registry: RegistryHandle,
    relay: StreamRelay,
    session_id: SessionId,
    /// Cancels the receive loop and every relay this socket started.
    cancel: CancellationToken,
    relays: JoinSet<RelayOutcome>,
}

impl SocketSession {
    pub fn new(state: AppState, session_id: SessionId) -> Self {
        Self {
            relay: state.relay(),
            registry: state.registry,
            session_id,
            cancel: state.shutdown.child_token(),
            relays: JoinSet::new(),
        }
    }

    /// Runs the socket until the peer closes, errors, or shutdown.
    pub async fn run(mut self, socket: WebSocket) {
        let (ws_tx, mut ws_rx) = socket.split();
        let (sink, out_rx) = ConnectionSink::channel(SINK_CAPACITY);
        let connection_id = self.registry.register(self.session_id.clone(), sink).await;
        let mut writer = spawn_writer(ws_tx, out_rx, connection_id.clone());

        info!(
            session_id = %self.session_id,
            connection_id = %connection_id,
            "Socket connected"
        );

        self.registry
            .send(
                &connection_id,
                ControlFrame::connected(self.session_id.clone(), connection_id.clone()),
            )
            .await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(connection_id = %connection_id, "Socket closing for shutdown");
                    break;
                }

                Some(joined) = self.relays.join_next(), if !self.relays.is_empty() => {
                    if let Err(e) = joined {
                        error!(connection_id = %connection_id, error = %e, "Relay task failed");
                    }
                }

                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text(&connection_id, text.as_str()).await;
                        }
                        Some(Ok(Message::Binary(_))) => {
                            self.reject(&connection_id, FrameError::Binary).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!(connection_id = %connection_id, "Client closed socket");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            debug!(connection_id = %connection_id, error = %e, "Socket read error");
                            break;
                        }
                    }
                }
            }
        }

        // Stop relays this socket started, then leave the session.
        self.cancel.cancel();
        while self.relays.join_next().await.is_some() {}
        self.registry.unregister(&connection_id, &self.session_id).await;

        // Dropping the registry entry closes the sink, letting the writer flush and exit.
        if timeout(WRITE_TIMEOUT, &mut writer).await.is_err() {
            writer.abort();
        }

        info!(
            session_id = %self.session_id,
            connection_id = %connection_id,
            "Socket disconnected"
        );
    }

    async fn handle_text(&mut self, connection_id: &ConnectionId, text: &str) {
        match decode_client_frame(text) {
            Ok(ClientFrame::Chat { message, options }) => {
                let request = ExchangeRequest::new(self.session_id.clone(), message).with_options(options);
                let relay = self.relay.clone();
                let cancel = self.cancel.clone();
                debug!(connection_id = %connection_id, "Chat frame received");
                self.relays.spawn(async move { relay.run(request, cancel).await });
            }
            Ok(ClientFrame::Ping { seq }) => {
                self.registry.send(connection_id, ControlFrame::pong(seq)).await;
            }
            Err(e) => self.reject(connection_id, e).await,
        }
    }

    /// Reports bad client input to this connection only.
    async fn reject(&self, connection_id: &ConnectionId, error: FrameError) {
        warn!(
            session_id = %self.session_id,
            connection_id = %connection_id,
            error = %error,
            "Malformed client frame"
        );
        self.registry
            .send(connection_id, Envelope::client_error(self.session_id.clone(), error.to_string()))
            .await;
    }
}

/// Drains the connection's sink onto the socket.
fn spawn_writer(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::Receiver<OutboundFrame>,
    connection_id: ConnectionId,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let text = match encode_server_frame(&frame) {
                Ok(text) => text,
                Err(e) => {
                    error!(connection_id = %connection_id, error = %e, "Failed to encode frame");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                debug!(connection_id = %connection_id, "Socket write failed, writer stopping");
                break;
            }
        }
        let _ = ws_tx.close().await;
    })
}
