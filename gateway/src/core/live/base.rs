//! Base traits and types for live generative-audio sessions.
//!
//! A live session is a bidirectional streaming connection to a generative
//! voice backend: raw audio goes in, synthesized audio comes out at the
//! backend's own pace. Output chunk boundaries are decided by the backend and
//! need not line up with input frames.
//!
//! # Supported Providers
//!
//! - Gemini Live API (`BidiGenerateContent` over WebSocket)

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during live session operations.
#[derive(Debug, Clone, Error)]
pub enum LiveError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Provider-specific error
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// The provider closed the session without being asked to
    #[error("Session closed: {0}")]
    SessionClosed(String),
}

/// Result type for live session operations.
pub type LiveResult<T> = Result<T, LiveError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Default response modality: the agent only ever speaks.
pub const DEFAULT_RESPONSE_MODALITY: &str = "AUDIO";

/// Default timeout for establishing a session (handshake + setup acknowledgement).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Base configuration for live session providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSessionConfig {
    /// API key for authentication
    pub api_key: String,

    /// Provider name (e.g., "gemini")
    #[serde(default)]
    pub provider: String,

    /// Model to use
    #[serde(default)]
    pub model: String,

    /// Prebuilt voice for synthesized output
    #[serde(default)]
    pub voice: Option<String>,

    /// Static system instruction for the agent
    #[serde(default)]
    pub instructions: Option<String>,

    /// Response modalities requested from the backend
    #[serde(default = "default_modalities")]
    pub response_modalities: Vec<String>,

    /// Mime type announced for input audio chunks
    #[serde(default)]
    pub input_mime_type: String,

    /// Override of the provider WebSocket endpoint (tests, proxies)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Handshake and setup timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_modalities() -> Vec<String> {
    vec![DEFAULT_RESPONSE_MODALITY.to_string()]
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

impl Default for LiveSessionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            provider: String::new(),
            model: String::new(),
            voice: None,
            instructions: None,
            response_modalities: default_modalities(),
            input_mime_type: String::new(),
            endpoint: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Transport-level connection state of a live session client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected to the provider
    #[default]
    Disconnected,
    /// Currently connecting
    Connecting,
    /// Connected and ready
    Connected,
    /// Connection failed or dropped unexpectedly
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Failed => write!(f, "Failed"),
        }
    }
}

// =============================================================================
// Callback Types
// =============================================================================

/// Synthesized audio emitted by the backend.
#[derive(Debug, Clone)]
pub struct LiveAudioData {
    /// Raw audio bytes as produced by the backend
    pub data: Bytes,
    /// Mime type reported by the backend, if any
    pub mime_type: Option<String>,
}

/// Callback type for audio output events.
pub type AudioOutputCallback =
    Arc<dyn Fn(LiveAudioData) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for barge-in events (the backend stopped its current turn).
pub type InterruptedCallback =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for terminal session errors.
pub type LiveErrorCallback =
    Arc<dyn Fn(LiveError) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

// =============================================================================
// Base Trait
// =============================================================================

/// Base trait for live generative-audio session providers.
///
/// Callbacks should be registered before [`connect`](BaseLiveSession::connect)
/// so that no backend output is missed.
#[async_trait]
pub trait BaseLiveSession: Send + Sync {
    /// Create a new live session instance.
    fn new(config: LiveSessionConfig) -> LiveResult<Self>
    where
        Self: Sized;

    /// Establish the session. Resolves once the backend is ready for audio.
    async fn connect(&mut self) -> LiveResult<()>;

    /// Close the session. Safe to call repeatedly.
    async fn disconnect(&mut self) -> LiveResult<()>;

    /// Check if the session is connected and ready.
    fn is_ready(&self) -> bool;

    /// Get the current connection state.
    fn get_connection_state(&self) -> ConnectionState;

    /// Send one inbound audio frame to the backend.
    async fn send_audio(&mut self, audio_data: Bytes) -> LiveResult<()>;

    /// Register a callback for synthesized audio chunks.
    fn on_audio(&mut self, callback: AudioOutputCallback) -> LiveResult<()>;

    /// Register a callback for backend barge-in notifications.
    fn on_interrupted(&mut self, callback: InterruptedCallback) -> LiveResult<()>;

    /// Register a callback for errors that end the session.
    ///
    /// Not invoked after an intentional [`disconnect`](BaseLiveSession::disconnect).
    fn on_error(&mut self, callback: LiveErrorCallback) -> LiveResult<()>;

    /// Get provider information.
    fn get_provider_info(&self) -> serde_json::Value;
}

// =============================================================================
// Factory
// =============================================================================

/// Boxed trait object for live sessions.
pub type BoxedLiveSession = Box<dyn BaseLiveSession>;

/// Creates live sessions for bridges.
///
/// Each bridge asks the factory for its own session, so no client state is
/// shared between calls.
pub trait LiveSessionFactory: Send + Sync {
    /// Create a new, not yet connected, session.
    fn create(&self, config: LiveSessionConfig) -> LiveResult<BoxedLiveSession>;
}
