//! Twilio Media Streams WebSocket message types.
//!
//! Inbound events (Twilio to us) are internally tagged on `event`:
//! - connected - Socket open, no stream yet
//! - start - Stream metadata, carries the `streamSid`
//! - media - One base64 audio frame
//! - stop - Stream ended
//! - mark - A mark we sent earlier has been played
//! - dtmf - Keypad digit
//!
//! Outbound events are `media` (audio for the caller) and `clear` (flush
//! audio Twilio has buffered but not yet played).

use std::collections::HashMap;

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Inbound
// =============================================================================

/// Audio format of the stream as announced by Twilio.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFormat {
    pub encoding: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Metadata of the `start` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMetadata {
    pub stream_sid: String,
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub account_sid: Option<String>,
    #[serde(default)]
    pub tracks: Vec<String>,
    #[serde(default)]
    pub custom_parameters: HashMap<String, String>,
    #[serde(default)]
    pub media_format: Option<MediaFormat>,
}

/// Payload of the `media` event.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMedia {
    /// Base64 audio
    pub payload: String,
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub chunk: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DtmfPayload {
    #[serde(default)]
    pub track: Option<String>,
    pub digit: String,
}

/// Raw inbound message as sent by Twilio.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum InboundMessage {
    Connected {
        #[serde(default)]
        protocol: Option<String>,
        #[serde(default)]
        version: Option<String>,
    },
    Start {
        start: StartMetadata,
    },
    Media {
        media: InboundMedia,
    },
    Stop {
        #[serde(default, rename = "streamSid")]
        stream_sid: Option<String>,
    },
    Mark {
        #[serde(default)]
        mark: Option<MarkPayload>,
    },
    Dtmf {
        #[serde(default)]
        dtmf: Option<DtmfPayload>,
    },
    /// Any event this gateway does not act on
    #[serde(other)]
    Unknown,
}

// =============================================================================
// Outbound
// =============================================================================

/// Audio payload of an outbound `media` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMedia {
    /// Base64 audio
    pub payload: String,
}

/// Message sent to Twilio over the media stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundMessage {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

impl OutboundMessage {
    /// Create a media event from raw audio bytes.
    pub fn media(stream_sid: &str, audio: &[u8]) -> Self {
        OutboundMessage::Media {
            stream_sid: stream_sid.to_string(),
            media: OutboundMedia {
                payload: BASE64_STANDARD.encode(audio),
            },
        }
    }

    pub fn clear(stream_sid: &str) -> Self {
        OutboundMessage::Clear {
            stream_sid: stream_sid.to_string(),
        }
    }
}

// =============================================================================
// Parsed Events
// =============================================================================

/// Stream identity recorded from the `start` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStart {
    pub stream_sid: String,
    pub call_sid: Option<String>,
    pub media_format: Option<MediaFormat>,
    pub custom_parameters: HashMap<String, String>,
}

/// Control and data events the bridge acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelephonyEvent {
    Connected,
    Start(StreamStart),
    /// Decoded audio frame
    Media(Bytes),
    Stop,
    Mark(String),
    Dtmf(String),
    /// Well-formed event with no meaning for the bridge
    Ignored,
}

/// Errors raised while parsing inbound telephony messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelephonyError {
    /// The message could not be parsed
    #[error("Malformed telephony message: {0}")]
    Malformed(String),
}

/// Parse one inbound text frame into a bridge event.
///
/// Media payloads are base64-decoded here so the rest of the bridge only
/// handles raw bytes.
pub fn parse_inbound(text: &str) -> Result<TelephonyEvent, TelephonyError> {
    let message: InboundMessage =
        serde_json::from_str(text).map_err(|e| TelephonyError::Malformed(e.to_string()))?;

    let event = match message {
        InboundMessage::Connected { protocol, version } => {
            tracing::debug!(?protocol, ?version, "Telephony stream connected");
            TelephonyEvent::Connected
        }
        InboundMessage::Start { start } => {
            if start.stream_sid.is_empty() {
                return Err(TelephonyError::Malformed(
                    "start event without streamSid".to_string(),
                ));
            }
            TelephonyEvent::Start(StreamStart {
                stream_sid: start.stream_sid,
                call_sid: start.call_sid,
                media_format: start.media_format,
                custom_parameters: start.custom_parameters,
            })
        }
        InboundMessage::Media { media } => {
            if media.track.as_deref().is_some_and(|t| t == "outbound") {
                // Echo of our own audio on a both-tracks stream.
                return Ok(TelephonyEvent::Ignored);
            }
            let audio = BASE64_STANDARD
                .decode(media.payload.as_bytes())
                .map_err(|e| TelephonyError::Malformed(format!("invalid media payload: {e}")))?;
            TelephonyEvent::Media(Bytes::from(audio))
        }
        InboundMessage::Stop { .. } => TelephonyEvent::Stop,
        InboundMessage::Mark { mark } => {
            TelephonyEvent::Mark(mark.map(|m| m.name).unwrap_or_default())
        }
        InboundMessage::Dtmf { dtmf } => {
            TelephonyEvent::Dtmf(dtmf.map(|d| d.digit).unwrap_or_default())
        }
        InboundMessage::Unknown => TelephonyEvent::Ignored,
    };

    Ok(event)
}
