//! Configuration module for the SalesVoice gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//! The configuration is split into logical submodules for maintainability.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use salesvoice_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use crate::core::audio::AudioTranscoding;
use crate::core::bridge::BridgeConfig;
use crate::core::live::{DEFAULT_RESPONSE_MODALITY, LiveSessionConfig};
use crate::core::live::gemini::{GEMINI_LIVE_DEFAULT_MODEL, pcm_mime_type};
use crate::core::telephony::TWILIO_API_BASE_URL;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

/// Default HTTP port, matching the port Twilio webhooks are usually pointed at.
pub const DEFAULT_PORT: u16 = 8080;

/// Narrowband telephony sample rate.
pub const DEFAULT_TELEPHONY_SAMPLE_RATE: u32 = 8000;

/// Voice used when none is configured.
pub const DEFAULT_GEMINI_VOICE: &str = "Puck";

/// Static behavioral instruction for the sales agent.
pub const DEFAULT_AGENT_INSTRUCTIONS: &str =
    "You are Alex, a sales agent selling websites for $800. Be concise and professional.";

/// Spoken to the caller before the media stream is connected.
pub const DEFAULT_CALL_GREETING: &str = "Connecting to Sales Voice AI.";

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway, including:
/// - Server settings (host, port, TLS, public host)
/// - Live session settings (Gemini key, model, voice, instructions)
/// - Audio profile and bridge policy
/// - Twilio call settings
/// - Security settings (CORS, rate limiting, connection limits)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Public hostname used in TwiML stream URLs and outbound-call webhooks.
    /// Falls back to the request's Host header when unset.
    pub public_host: Option<String>,

    // Live session settings
    /// Gemini API key. Sessions fail to open without it.
    pub gemini_api_key: Option<String>,
    /// Live provider name (default: "gemini")
    pub live_provider: String,
    pub gemini_model: String,
    pub gemini_voice: String,
    pub agent_instructions: String,
    /// Override of the Gemini Live WebSocket endpoint
    pub gemini_live_url: Option<String>,

    // Audio profile
    /// Telephony sample rate in Hz (default: 8000)
    pub telephony_sample_rate: u32,
    pub audio_transcoding: AudioTranscoding,

    // Bridge policy
    pub bridge: BridgeConfig,

    // Twilio settings
    /// Base URL of the Twilio REST API (overridable for tests)
    pub twilio_api_base_url: String,
    pub call_greeting: String,
    /// Spoken after the media stream ends, if set
    pub call_fallback_message: Option<String>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,

    // Connection limits
    /// Maximum concurrent media stream connections
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    /// Default: 100
    pub max_connections_per_ip: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            tls: None,
            public_host: None,
            gemini_api_key: None,
            live_provider: "gemini".to_string(),
            gemini_model: GEMINI_LIVE_DEFAULT_MODEL.to_string(),
            gemini_voice: DEFAULT_GEMINI_VOICE.to_string(),
            agent_instructions: DEFAULT_AGENT_INSTRUCTIONS.to_string(),
            gemini_live_url: None,
            telephony_sample_rate: DEFAULT_TELEPHONY_SAMPLE_RATE,
            audio_transcoding: AudioTranscoding::default(),
            bridge: BridgeConfig::default(),
            twilio_api_base_url: TWILIO_API_BASE_URL.to_string(),
            call_greeting: DEFAULT_CALL_GREETING.to_string(),
            call_fallback_message: None,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_websocket_connections: None,
            max_connections_per_ip: 100,
        }
    }
}

/// Zeroize the API key when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.gemini_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// The `.env` file is expected to have been loaded by the binary already.
    /// Missing values fall back to defaults. The result is validated.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    ///
    /// # Example
    /// ```rust,no_run
    /// use salesvoice_gateway::config::ServerConfig;
    /// use std::path::PathBuf;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
    /// println!("Server listening on {}", config.address());
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Whether a Gemini API key is configured
    pub fn has_gemini_key(&self) -> bool {
        self.gemini_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    /// Host to advertise to Twilio, preferring the configured public host.
    pub fn resolve_public_host<'a>(&'a self, request_host: Option<&'a str>) -> Option<&'a str> {
        self.public_host
            .as_deref()
            .or(request_host)
            .map(str::trim)
            .filter(|host| !host.is_empty())
    }

    /// Build the per-call live session configuration.
    ///
    /// The input mime type announces the telephony sample rate, since inbound
    /// frames are relayed at that rate.
    pub fn live_session_config(&self) -> LiveSessionConfig {
        LiveSessionConfig {
            api_key: self.gemini_api_key.clone().unwrap_or_default(),
            provider: self.live_provider.clone(),
            model: self.gemini_model.clone(),
            voice: Some(self.gemini_voice.clone()),
            instructions: Some(self.agent_instructions.clone()),
            response_modalities: vec![DEFAULT_RESPONSE_MODALITY.to_string()],
            input_mime_type: pcm_mime_type(self.telephony_sample_rate),
            endpoint: self.gemini_live_url.clone(),
            connect_timeout_ms: self.bridge.session_open_timeout_ms,
        }
    }
}
