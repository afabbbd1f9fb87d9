//! Twilio Media Streams WebSocket
//!
//! Twilio connects here after the `/incoming-call` TwiML runs. Each
//! connection gets its own bridge to a fresh live session.
//!
//! ## Twilio → Server (JSON text frames)
//!
//! - **connected**: protocol handshake
//! - **start**: stream metadata (`streamSid`, `callSid`, media format)
//! - **media**: base64 audio payload, one 20ms frame per message
//! - **mark** / **dtmf**: playback markers and key presses (logged)
//! - **stop**: the call ended
//!
//! ## Server → Twilio
//!
//! - **media**: base64 agent audio for the stream
//! - **clear**: flush queued playback when the caller barges in

mod handler;

pub use handler::media_stream_handler;
