use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// This structure represents the full configuration that can be loaded from a YAML file.
/// All fields are optional to allow partial configuration. Values present here override
/// the environment.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8080
///   public_host: "voice.example.com"
///   tls:
///     enabled: true
///     cert_path: "/etc/ssl/cert.pem"
///     key_path: "/etc/ssl/key.pem"
///
/// gemini:
///   api_key: "your-gemini-key"
///   provider: "gemini"
///   model: "gemini-2.5-flash-native-audio-preview-12-2025"
///   voice: "Puck"
///   instructions: "You are Alex, a sales agent."
///   url: "wss://generativelanguage.googleapis.com/..."
///
/// audio:
///   transcoding: "passthrough"
///   telephony_sample_rate: 8000
///
/// bridge:
///   max_buffered_frames: 250
///   session_open_timeout_ms: 10000
///   malformed_policy: "drop"
///   malformed_close_threshold: 5
///   max_session_reconnects: 0
///   clear_on_interrupt: true
///
/// twilio:
///   api_base_url: "https://api.twilio.com"
///   greeting: "Connecting to Sales Voice AI."
///   fallback_message: "Sorry, the assistant is unavailable."
///
/// security:
///   cors_allowed_origins: "https://app.example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///   max_websocket_connections: 500
///   max_connections_per_ip: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub gemini: Option<GeminiYaml>,
    pub audio: Option<AudioYaml>,
    pub bridge: Option<BridgeYaml>,
    pub twilio: Option<TwilioYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_host: Option<String>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Live session settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeminiYaml {
    pub api_key: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub instructions: Option<String>,
    pub url: Option<String>,
}

/// Audio profile from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AudioYaml {
    /// `passthrough` or `mulaw`
    pub transcoding: Option<String>,
    pub telephony_sample_rate: Option<u32>,
}

/// Bridge policy from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BridgeYaml {
    pub max_buffered_frames: Option<usize>,
    pub session_open_timeout_ms: Option<u64>,
    /// `drop` or `close`
    pub malformed_policy: Option<String>,
    pub malformed_close_threshold: Option<u32>,
    pub max_session_reconnects: Option<u32>,
    pub clear_on_interrupt: Option<bool>,
}

/// Twilio call settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TwilioYaml {
    pub api_base_url: Option<String>,
    pub greeting: Option<String>,
    pub fallback_message: Option<String>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
