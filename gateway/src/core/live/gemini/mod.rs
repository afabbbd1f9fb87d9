//! Gemini Live API module.
//!
//! Bidirectional audio streaming against Google's `BidiGenerateContent`
//! WebSocket endpoint.
//!
//! # Supported Voices
//!
//! Puck, Charon, Kore, Fenrir, Aoede, Leda, Orus, Zephyr
//!
//! # Audio Format
//!
//! Input is raw PCM announced with its sample rate (`audio/pcm;rate=8000`
//! for telephony). Output is PCM 16-bit signed little-endian at 24kHz.

mod client;
mod config;
mod messages;

pub use client::GeminiLive;
pub use config::{
    GEMINI_LIVE_DEFAULT_MODEL, GEMINI_LIVE_OUTPUT_SAMPLE_RATE, GEMINI_LIVE_URL, GeminiVoice,
    pcm_mime_type, qualified_model_name,
};
pub use messages::{
    Blob, ClientMessage, GenerationConfig, ModelTurn, Part, RealtimeInput, ServerContent,
    ServerMessage, Setup,
};
