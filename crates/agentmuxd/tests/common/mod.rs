//! Shared helpers for the daemon integration tests.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use agentmux_core::{ConnectionId, FragmentSource, SessionId};
use agentmux_protocol::{
    decode_server_frame, encode_client_frame, ChatRequest, ClientFrame, ControlFrame, Envelope, ServerFrame,
    SseDecoder,
};
use agentmux_source::EchoSource;
use agentmuxd::registry::{spawn_registry, RegistryHandle};
use agentmuxd::server::HubServer;

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for any single frame
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between registry polls
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Grace period for server shutdown
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_millis(100);

// ============================================================================
// Test Server
// ============================================================================

/// Test server context that manages server lifecycle.
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: RegistryHandle,
    pub cancel_token: CancellationToken,
    pub http: reqwest::Client,
}

impl TestServer {
    /// Spawns a server backed by the echo source.
    pub async fn spawn() -> Self {
        Self::with_source(Arc::new(EchoSource::new())).await
    }

    /// Spawns a server on an ephemeral port with the given source.
    pub async fn with_source(source: Arc<dyn FragmentSource>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
        let addr = listener.local_addr().expect("local addr");

        let registry = spawn_registry();
        let cancel_token = CancellationToken::new();
        let server = HubServer::new(addr, registry.clone(), source, cancel_token.clone());

        // The listener is already bound, so clients can connect immediately.
        tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        Self {
            addr,
            registry,
            cancel_token,
            http: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Opens a socket on `path` (`/ws` or `/ws/{session}`) and reads the greeting.
    pub async fn connect(&self, path: &str) -> TestSocket {
        let (stream, _) = connect_async(format!("ws://{}{}", self.addr, path))
            .await
            .expect("websocket connect");
        let mut socket = TestSocket {
            stream,
            session_id: SessionId::new(""),
            connection_id: ConnectionId::new(""),
        };

        match socket.recv().await {
            ServerFrame::Control(ControlFrame::System {
                message,
                session_id,
                connection_id,
            }) => {
                assert_eq!(message, "connected");
                socket.session_id = session_id;
                socket.connection_id = connection_id;
            }
            other => panic!("Expected greeting, got {other:?}"),
        }
        socket
    }

    /// Runs one exchange over `POST /api/chat/stream` and returns its envelopes.
    pub async fn sse_exchange(&self, request: &ChatRequest) -> Vec<Envelope> {
        let response = self
            .http
            .post(self.url("/api/chat/stream"))
            .json(request)
            .send()
            .await
            .expect("send sse request");
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").and_then(|v| v.to_str().ok()),
            Some("text/event-stream")
        );

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut envelopes = Vec::new();

        while let Some(bytes) = timeout(RECV_TIMEOUT, body.next()).await.expect("sse timeout") {
            for data in decoder.push(&bytes.expect("sse body")) {
                if let ServerFrame::Envelope(env) = decode_server_frame(&data).expect("decode sse frame") {
                    envelopes.push(env);
                }
            }
        }
        envelopes
    }

    /// Polls the registry until `session_id` has `expected` connections.
    pub async fn wait_for_members(&self, session_id: &SessionId, expected: usize) {
        let result = timeout(RECV_TIMEOUT, async {
            loop {
                if self.registry.session_connections(session_id).await.len() == expected {
                    return;
                }
                sleep(POLL_INTERVAL).await;
            }
        })
        .await;
        assert!(result.is_ok(), "session {session_id} never reached {expected} members");
    }

    /// Polls the registry until no connections remain.
    pub async fn wait_until_empty(&self) {
        let result = timeout(RECV_TIMEOUT, async {
            loop {
                let stats = self.registry.stats().await.expect("registry stats");
                if stats.connections == 0 && stats.sessions == 0 {
                    return;
                }
                sleep(POLL_INTERVAL).await;
            }
        })
        .await;
        assert!(result.is_ok(), "registry never emptied");
    }

    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        sleep(SHUTDOWN_GRACE_PERIOD).await;
    }
}

// ============================================================================
// Test Socket
// ============================================================================

/// Test socket connection with protocol helpers.
pub struct TestSocket {
    pub stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pub session_id: SessionId,
    pub connection_id: ConnectionId,
}

impl TestSocket {
    pub async fn send(&mut self, frame: &ClientFrame) {
        let text = encode_client_frame(frame).expect("encode client frame");
        self.send_raw(&text).await;
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.stream.send(Message::text(text.to_string())).await.expect("socket send");
    }

    /// Receives the next server frame, skipping transport-level pings.
    pub async fn recv(&mut self) -> ServerFrame {
        loop {
            let msg = timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .expect("socket recv timeout")
                .expect("socket closed")
                .expect("socket error");
            match msg {
                Message::Text(text) => return decode_server_frame(text.as_str()).expect("decode server frame"),
                Message::Ping(_) | Message::Pong(_) => continue,
                other => panic!("Unexpected socket message: {other:?}"),
            }
        }
    }

    pub async fn recv_envelope(&mut self) -> Envelope {
        match self.recv().await {
            ServerFrame::Envelope(env) => env,
            other => panic!("Expected envelope, got {other:?}"),
        }
    }

    /// Collects envelopes until the first terminal one.
    pub async fn recv_exchange(&mut self) -> Vec<Envelope> {
        let mut envelopes = Vec::new();
        loop {
            let env = self.recv_envelope().await;
            let done = env.is_terminal();
            envelopes.push(env);
            if done {
                return envelopes;
            }
        }
    }

    /// Sends a ping and asserts the very next frame is its pong.
    pub async fn assert_quiet(&mut self, seq: u64) {
        self.send(&ClientFrame::ping(seq)).await;
        assert_eq!(self.recv().await, ServerFrame::Control(ControlFrame::pong(seq)));
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}

// ============================================================================
// Envelope helpers
// ============================================================================

pub fn kinds(envelopes: &[Envelope]) -> Vec<&'static str> {
    envelopes.iter().map(Envelope::kind).collect()
}

/// Concatenates the chunk payloads in order.
pub fn content(envelopes: &[Envelope]) -> String {
    envelopes
        .iter()
        .filter_map(|env| match env {
            Envelope::StreamChunk { chunk, .. } => Some(chunk.as_str()),
            _ => None,
        })
        .collect()
}
