//! Live generative-audio session module.
//!
//! This module provides the abstraction over streaming voice backends and the
//! Gemini Live implementation used by the call bridge.
//!
//! # Architecture
//!
//! - `BaseLiveSession` trait for provider abstraction
//! - `LiveSessionFactory` so each bridge creates its own session
//! - Callback-based event handling
//!
//! # Example
//!
//! ```rust,ignore
//! use salesvoice_gateway::core::live::{create_live_session, LiveSessionConfig};
//!
//! let config = LiveSessionConfig {
//!     api_key: "AIza...".to_string(),
//!     provider: "gemini".to_string(),
//!     ..Default::default()
//! };
//!
//! let mut session = create_live_session("gemini", config)?;
//! session.connect().await?;
//! ```

mod base;
pub mod gemini;

pub use base::{
    AudioOutputCallback, BaseLiveSession, BoxedLiveSession, ConnectionState,
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_RESPONSE_MODALITY, InterruptedCallback, LiveAudioData,
    LiveError, LiveErrorCallback, LiveResult, LiveSessionConfig, LiveSessionFactory,
};
pub use gemini::{GEMINI_LIVE_OUTPUT_SAMPLE_RATE, GEMINI_LIVE_URL, GeminiLive, GeminiVoice};

/// Supported live providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveProvider {
    /// Google Gemini Live API
    Gemini,
}

impl LiveProvider {
    /// Parse provider from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" | "gemini-live" | "gemini_live" => Some(LiveProvider::Gemini),
            _ => None,
        }
    }
}

impl std::fmt::Display for LiveProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiveProvider::Gemini => write!(f, "gemini"),
        }
    }
}

/// Factory function to create a live session.
///
/// # Supported Providers
///
/// - `"gemini"` / `"google"` - Gemini Live API
pub fn create_live_session(
    provider_type: &str,
    config: LiveSessionConfig,
) -> LiveResult<BoxedLiveSession> {
    match LiveProvider::parse(provider_type) {
        Some(LiveProvider::Gemini) => Ok(Box::new(GeminiLive::new(config)?)),
        None => Err(LiveError::InvalidConfiguration(format!(
            "Unsupported live provider: {provider_type}. Supported providers: {}",
            get_supported_live_providers().join(", ")
        ))),
    }
}

/// Get list of supported live providers.
pub fn get_supported_live_providers() -> Vec<&'static str> {
    vec!["gemini"]
}

/// Factory that dispatches on `LiveSessionConfig::provider`.
///
/// An empty provider name selects Gemini.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLiveSessionFactory;

impl LiveSessionFactory for DefaultLiveSessionFactory {
    fn create(&self, config: LiveSessionConfig) -> LiveResult<BoxedLiveSession> {
        let provider = if config.provider.is_empty() {
            LiveProvider::Gemini.to_string()
        } else {
            config.provider.clone()
        };
        create_live_session(&provider, config)
    }
}
