//! agentmux Protocol - Wire formats shared by the daemon and its clients
//!
//! This crate provides the stream envelope model, the socket frame types,
//! the HTTP request/response bodies and the codec that maps them onto
//! SSE (`data: <json>\n\n`) and WebSocket text frames.

pub mod codec;
pub mod envelope;
pub mod message;

pub use codec::{
    decode_client_frame, decode_server_frame, encode_client_frame, encode_server_frame, sse_frame,
    FrameError, SseDecoder, MAX_FRAME_SIZE,
};
pub use envelope::Envelope;
pub use message::{
    ChatRequest, ChatResponse, ClientFrame, ControlFrame, ServerFrame, SessionSummary,
};
