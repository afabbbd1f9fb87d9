//! Audio helpers for the call bridge.
//!
//! Twilio streams 8kHz μ-law while Gemini Live accepts raw PCM and answers
//! with PCM16 at 24kHz. By default payloads are relayed untouched; the
//! `mulaw` mode converts between the two.

pub mod codec;
mod transcoder;

pub use codec::{decode_ulaw, encode_ulaw, linear_to_ulaw, ulaw_to_linear};
pub use transcoder::{AudioTranscoder, AudioTranscoding};
