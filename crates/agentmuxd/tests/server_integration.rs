//! Integration tests for the HTTP/WebSocket server.
//!
//! These tests run the real axum server on an ephemeral port and drive it
//! with `tokio-tungstenite` sockets and `reqwest` HTTP clients, covering
//! session fan-out across both adapters, control frames and diagnostics.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

mod common;

use serde_json::Value;

use agentmux_core::SessionId;
use agentmux_protocol::{ChatRequest, ChatResponse, ClientFrame, Envelope, SessionSummary};

use common::{content, kinds, TestServer};

// ============================================================================
// Discovery & Health
// ============================================================================

#[tokio::test]
async fn test_health_and_index() {
    let server = TestServer::spawn().await;

    let health: Value = server
        .http
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");

    let chat_health: Value = server
        .http
        .get(server.url("/api/chat/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(chat_health["provider"], "echo");

    let index: Value = server.http.get(server.url("/")).send().await.unwrap().json().await.unwrap();
    assert!(index["endpoints"]["chat_stream"].is_string());

    server.shutdown().await;
}

// ============================================================================
// Socket adapter
// ============================================================================

#[tokio::test]
async fn test_socket_greeting_uses_path_session() {
    let server = TestServer::spawn().await;

    let socket = server.connect("/ws/room-1").await;
    assert_eq!(socket.session_id, SessionId::new("room-1"));
    assert!(!socket.connection_id.as_str().is_empty());

    let anonymous = server.connect("/ws").await;
    assert!(!anonymous.session_id.as_str().is_empty());
    assert_ne!(anonymous.session_id, socket.session_id);

    server.shutdown().await;
}

#[tokio::test]
async fn test_socket_session_id_is_kept_verbatim() {
    let server = TestServer::spawn().await;

    let padded = server.connect("/ws/%20padded%20").await;
    assert_eq!(padded.session_id, SessionId::new(" padded "));

    let plain = server.connect("/ws/padded").await;
    assert_ne!(plain.session_id, padded.session_id);

    let blank = server.connect("/ws/%20%20").await;
    assert!(!blank.session_id.as_str().trim().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_socket_chat_streams_full_exchange() {
    let server = TestServer::spawn().await;
    let mut socket = server.connect("/ws/s1").await;

    socket.send(&ClientFrame::chat("hello brave world")).await;
    let envelopes = socket.recv_exchange().await;

    assert_eq!(
        kinds(&envelopes),
        vec!["stream_start", "stream_chunk", "stream_chunk", "stream_chunk", "stream_end"]
    );
    assert_eq!(content(&envelopes), "hello brave world");

    // Every envelope of one exchange shares its message id and session.
    let message_id = envelopes[0].message_id().cloned().unwrap();
    for env in &envelopes {
        assert_eq!(env.message_id(), Some(&message_id));
        assert_eq!(env.session_id(), &SessionId::new("s1"));
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_legacy_user_input_frame() {
    let server = TestServer::spawn().await;
    let mut socket = server.connect("/ws/legacy").await;

    socket.send_raw(r#"{"type":"user_input","message":"hi there"}"#).await;
    let envelopes = socket.recv_exchange().await;
    assert_eq!(content(&envelopes), "hi there");
    assert_eq!(envelopes.last().map(Envelope::kind), Some("stream_end"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_ping_pong_goes_to_sender_only() {
    let server = TestServer::spawn().await;
    let mut a = server.connect("/ws/shared").await;
    let mut b = server.connect("/ws/shared").await;

    a.assert_quiet(7).await;
    // b never saw a's pong; its next frame is its own pong.
    b.assert_quiet(8).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_session_fanout_to_every_member() {
    let server = TestServer::spawn().await;
    let mut a = server.connect("/ws/team").await;
    let mut b = server.connect("/ws/team").await;
    let mut outsider = server.connect("/ws/elsewhere").await;
    server.wait_for_members(&SessionId::new("team"), 2).await;

    a.send(&ClientFrame::chat("one two")).await;
    let seen_by_a = a.recv_exchange().await;
    let seen_by_b = b.recv_exchange().await;

    assert_eq!(seen_by_a, seen_by_b);
    assert_eq!(content(&seen_by_b), "one two");

    // Nothing leaked into the other session.
    outsider.assert_quiet(1).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_malformed_frame_reports_error_to_sender_only() {
    let server = TestServer::spawn().await;
    let mut a = server.connect("/ws/bad").await;
    let mut b = server.connect("/ws/bad").await;

    a.send_raw("this is not json").await;
    match a.recv_envelope().await {
        Envelope::Error {
            message_id,
            session_id,
            error,
        } => {
            assert!(message_id.is_none());
            assert_eq!(session_id, SessionId::new("bad"));
            assert!(error.contains("invalid message format"));
        }
        other => panic!("Expected error envelope, got {other:?}"),
    }

    a.send_raw(r#"{"type":"chat"}"#).await;
    assert_eq!(a.recv_envelope().await.kind(), "error");

    b.assert_quiet(1).await;

    // The socket keeps working after bad input and the session still fans out.
    a.send(&ClientFrame::chat("still here")).await;
    let seen_by_a = a.recv_exchange().await;
    let seen_by_b = b.recv_exchange().await;
    assert_eq!(seen_by_a, seen_by_b);
    assert_eq!(content(&seen_by_a), "still here");

    server.shutdown().await;
}

// ============================================================================
// SSE adapter
// ============================================================================

#[tokio::test]
async fn test_sse_stream_emits_full_exchange() {
    let server = TestServer::spawn().await;

    let envelopes = server.sse_exchange(&ChatRequest::new("streamed reply").with_session("sse-1")).await;

    assert_eq!(kinds(&envelopes), vec!["stream_start", "stream_chunk", "stream_chunk", "stream_end"]);
    assert_eq!(content(&envelopes), "streamed reply");
    assert!(envelopes.iter().all(|e| e.session_id() == &SessionId::new("sse-1")));

    // The SSE connection is gone once the body ends.
    server.wait_until_empty().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_sse_without_session_generates_one() {
    let server = TestServer::spawn().await;

    let envelopes = server.sse_exchange(&ChatRequest::new("hi")).await;
    let session_id = envelopes[0].session_id().clone();
    assert!(!session_id.as_str().is_empty());
    assert!(envelopes.iter().all(|e| e.session_id() == &session_id));

    server.shutdown().await;
}

#[tokio::test]
async fn test_sse_exchange_fans_out_to_socket_members() {
    let server = TestServer::spawn().await;
    let mut watcher = server.connect("/ws/mixed").await;

    let via_sse = server.sse_exchange(&ChatRequest::new("seen twice").with_session("mixed")).await;
    let via_socket = watcher.recv_exchange().await;

    assert_eq!(via_sse, via_socket);

    server.shutdown().await;
}

// ============================================================================
// Non-streaming chat & diagnostics
// ============================================================================

#[tokio::test]
async fn test_nonstreaming_chat_returns_joined_content() {
    let server = TestServer::spawn().await;
    let mut watcher = server.connect("/ws/plain").await;

    let response: ChatResponse = server
        .http
        .post(server.url("/api/chat"))
        .json(&ChatRequest::new("all at once").with_session("plain"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(response.status, "success");
    assert_eq!(response.content, "all at once");
    assert_eq!(response.session_id, SessionId::new("plain"));

    // Socket members of the session still see the stream.
    let envelopes = watcher.recv_exchange().await;
    assert_eq!(envelopes[0].message_id(), Some(&response.message_id));

    server.shutdown().await;
}

#[tokio::test]
async fn test_session_diagnostics() {
    let server = TestServer::spawn().await;
    let socket = server.connect("/ws/diag").await;

    let sessions: Vec<SessionSummary> = server
        .http
        .get(server.url("/api/sessions"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_id, SessionId::new("diag"));

    let summary: SessionSummary = server
        .http
        .get(server.url("/api/sessions/diag"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary.connections, vec![socket.connection_id.clone()]);

    let missing = server.http.get(server.url("/api/sessions/nope")).send().await.unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = missing.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("nope"));

    server.shutdown().await;
}
