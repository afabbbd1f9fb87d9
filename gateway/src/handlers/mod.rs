//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `calls` - Outbound call creation and incoming-call TwiML
//! - `media_stream` - Twilio Media Streams WebSocket bridged to the live session

pub mod api;
pub mod calls;
pub mod media_stream;

pub use media_stream::media_stream_handler;
