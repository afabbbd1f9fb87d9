//! Gemini Live API WebSocket message types.
//!
//! Every frame is a JSON object with exactly one top-level key naming the
//! message kind.
//!
//! Client messages (sent to server):
//! - setup - First message on the socket; model, voice and instruction
//! - realtimeInput - Streamed media chunks
//!
//! Server messages (received from server):
//! - setupComplete - Setup accepted, audio may flow
//! - serverContent - Model output (`modelTurn`), `interrupted`, `turnComplete`
//! - goAway - The server will close the socket soon

use base64::prelude::*;
use serde::{Deserialize, Serialize};

// =============================================================================
// Shared Types
// =============================================================================

/// Inline media payload, base64-encoded on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    /// Mime type, e.g. `audio/pcm;rate=8000`
    #[serde(default)]
    pub mime_type: String,
    /// Base64-encoded bytes
    pub data: String,
}

/// A single content part carrying text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextPart {
    pub text: String,
}

/// Content made of text parts (used for the system instruction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<TextPart>,
}

// =============================================================================
// Client Messages (sent to server)
// =============================================================================

/// Prebuilt voice selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

/// Voice configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

/// Speech synthesis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

/// Generation configuration sent in the setup message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Response modalities (`AUDIO`, `TEXT`)
    pub response_modalities: Vec<String>,

    /// Voice used for audio responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

/// Session setup, the first message on every connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    /// Fully qualified model name (`models/...`)
    pub model: String,

    pub generation_config: GenerationConfig,

    /// Static behavioural instruction for the agent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

/// Streamed realtime input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<Blob>,
}

/// Client messages sent to the Gemini Live API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    /// Session setup
    Setup(Setup),
    /// Realtime media input
    RealtimeInput(RealtimeInput),
}

impl ClientMessage {
    /// Build a setup message.
    pub fn setup(
        model: String,
        response_modalities: Vec<String>,
        voice: Option<&str>,
        instructions: Option<&str>,
    ) -> Self {
        ClientMessage::Setup(Setup {
            model,
            generation_config: GenerationConfig {
                response_modalities,
                speech_config: voice.map(|v| SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: v.to_string(),
                        },
                    },
                }),
            },
            system_instruction: instructions.map(|text| Content {
                parts: vec![TextPart {
                    text: text.to_string(),
                }],
            }),
        })
    }

    /// Create a realtime audio input message from raw bytes.
    pub fn audio_chunk(data: &[u8], mime_type: &str) -> Self {
        ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![Blob {
                mime_type: mime_type.to_string(),
                data: BASE64_STANDARD.encode(data),
            }],
        })
    }
}

// =============================================================================
// Server Messages (received from server)
// =============================================================================

/// A part of a model turn.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Inline audio output
    #[serde(default)]
    pub inline_data: Option<Blob>,
    /// Text output (only with the TEXT modality)
    #[serde(default)]
    pub text: Option<String>,
}

/// Model output for the current turn.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Incremental server content.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<ModelTurn>,

    /// The model stopped its turn because the caller started speaking
    #[serde(default)]
    pub interrupted: bool,

    #[serde(default)]
    pub turn_complete: bool,

    #[serde(default)]
    pub generation_complete: bool,
}

/// Notice that the server will disconnect soon.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    #[serde(default)]
    pub time_left: Option<String>,
}

/// Server messages received from the Gemini Live API.
///
/// Unknown top-level keys (tool calls, usage metadata) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,

    #[serde(default)]
    pub server_content: Option<ServerContent>,

    #[serde(default)]
    pub go_away: Option<GoAway>,
}

impl ServerMessage {
    /// Whether this message acknowledges the setup.
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    /// Iterate over inline audio parts of the model turn, in order.
    pub fn audio_parts(&self) -> impl Iterator<Item = &Blob> {
        self.server_content
            .iter()
            .filter_map(|c| c.model_turn.as_ref())
            .flat_map(|t| t.parts.iter())
            .filter_map(|p| p.inline_data.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_serialization() {
        let msg = ClientMessage::setup(
            "models/gemini-test".to_string(),
            vec!["AUDIO".to_string()],
            Some("Puck"),
            Some("You are Alex."),
        );
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["setup"]["model"], "models/gemini-test");
        assert_eq!(
            json["setup"]["generationConfig"]["responseModalities"][0],
            "AUDIO"
        );
        assert_eq!(
            json["setup"]["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Puck"
        );
        assert_eq!(
            json["setup"]["systemInstruction"]["parts"][0]["text"],
            "You are Alex."
        );
    }

    #[test]
    fn test_setup_without_optionals() {
        let msg = ClientMessage::setup("models/m".to_string(), vec![], None, None);
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert!(json["setup"].get("systemInstruction").is_none());
        assert!(json["setup"]["generationConfig"].get("speechConfig").is_none());
    }

    #[test]
    fn test_audio_chunk() {
        let data = vec![0u8, 1, 2, 3];
        let msg = ClientMessage::audio_chunk(&data, "audio/pcm;rate=8000");
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        let chunk = &json["realtimeInput"]["mediaChunks"][0];
        assert_eq!(chunk["mimeType"], "audio/pcm;rate=8000");
        let decoded = BASE64_STANDARD
            .decode(chunk["data"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_setup_complete_parse() {
        let msg: ServerMessage = serde_json::from_str(r#"{"setupComplete": {}}"#).unwrap();
        assert!(msg.is_setup_complete());
        assert!(msg.server_content.is_none());
    }

    #[test]
    fn test_model_turn_parse_keeps_part_order() {
        let json = r#"{
            "serverContent": {
                "modelTurn": {
                    "parts": [
                        {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAAA"}},
                        {"text": "hello"},
                        {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "BBBB"}}
                    ]
                }
            }
        }"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        let parts: Vec<&str> = msg.audio_parts().map(|b| b.data.as_str()).collect();
        assert_eq!(parts, vec!["AAAA", "BBBB"]);
    }

    #[test]
    fn test_interrupted_and_unknown_keys() {
        let json = r#"{"serverContent": {"interrupted": true}, "usageMetadata": {"totalTokenCount": 3}}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        let content = msg.server_content.unwrap();
        assert!(content.interrupted);
        assert!(!content.turn_complete);
    }

    #[test]
    fn test_go_away_parse() {
        let msg: ServerMessage = serde_json::from_str(r#"{"goAway": {"timeLeft": "5s"}}"#).unwrap();
        assert_eq!(msg.go_away.unwrap().time_left.as_deref(), Some("5s"));
    }
}
