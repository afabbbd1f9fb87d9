//! Gemini Live API client implementation.
//!
//! This module provides the Gemini Live client that implements the
//! `BaseLiveSession` trait using the `BidiGenerateContent` WebSocket API.
//!
//! # API Reference
//!
//! - Endpoint: `wss://generativelanguage.googleapis.com/ws/...BidiGenerateContent?key=<api key>`
//! - Protocol: WebSocket with JSON messages (server frames may arrive as binary)
//! - Input audio: raw PCM announced as `audio/pcm;rate=<rate>`, base64 encoded
//! - Output audio: PCM 16-bit, 24kHz, mono, little-endian, base64 encoded
//!
//! # Example
//!
//! ```rust,ignore
//! use salesvoice_gateway::core::live::{BaseLiveSession, GeminiLive, LiveSessionConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = LiveSessionConfig {
//!         api_key: "AIza...".to_string(),
//!         voice: Some("Puck".to_string()),
//!         ..Default::default()
//!     };
//!
//!     let mut session = GeminiLive::new(config).unwrap();
//!     session.on_audio(Arc::new(|audio| Box::pin(async move {
//!         // Play audio.data
//!     }))).unwrap();
//!
//!     session.connect().await.unwrap();
//!     session.send_audio(audio_bytes).await.unwrap();
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use bytes::Bytes;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

use super::config::{
    GEMINI_LIVE_OUTPUT_SAMPLE_RATE, GEMINI_LIVE_URL, GeminiVoice, pcm_mime_type,
    qualified_model_name,
};
use super::messages::{ClientMessage, ServerMessage};
use crate::core::live::base::{
    AudioOutputCallback, BaseLiveSession, ConnectionState, InterruptedCallback, LiveAudioData,
    LiveError, LiveErrorCallback, LiveResult, LiveSessionConfig,
};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

/// How long `disconnect` waits for the close handshake before aborting the task.
const DISCONNECT_GRACE: Duration = Duration::from_millis(500);

/// Default input rate when the config does not name a mime type.
const DEFAULT_INPUT_SAMPLE_RATE: u32 = 8000;

// =============================================================================
// Gemini Live Client
// =============================================================================

/// Gemini Live API client implementation.
///
/// One instance owns one live session. All mutable state is behind `Arc`
/// so the spawned WebSocket task can share it with the owning struct.
///
/// The session is never re-established by the client itself: an unexpected
/// close is reported once through the error callback and the owner decides
/// what to do.
pub struct GeminiLive {
    /// Configuration
    config: LiveSessionConfig,
    /// Fully qualified model name
    model: String,
    /// Parsed voice
    voice: GeminiVoice,
    /// Mime type announced for input audio
    input_mime_type: String,
    /// Base endpoint (without the key parameter)
    endpoint: Url,
    /// Connection state
    state: Arc<RwLock<ConnectionState>>,
    /// Connected flag for fast checks (shared with connection task)
    connected: Arc<AtomicBool>,

    /// WebSocket sender channel
    ws_sender: Arc<Mutex<Option<mpsc::Sender<ClientMessage>>>>,

    /// Callbacks
    audio_callback: Arc<Mutex<Option<AudioOutputCallback>>>,
    interrupted_callback: Arc<Mutex<Option<InterruptedCallback>>>,
    error_callback: Arc<Mutex<Option<LiveErrorCallback>>>,

    /// Connection task handle
    connection_handle: Arc<Mutex<Option<JoinHandle<()>>>>,

    /// Set before an intentional close so the task does not report it as an error
    intentional_disconnect: Arc<AtomicBool>,
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

impl GeminiLive {
    /// Get the qualified model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the configured voice.
    pub fn voice(&self) -> GeminiVoice {
        self.voice
    }

    /// Get the mime type announced for input audio.
    pub fn input_mime_type(&self) -> &str {
        &self.input_mime_type
    }

    /// Build the WebSocket URL with the API key parameter.
    fn build_ws_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("key", &self.config.api_key);
        url
    }

    /// Build the setup message.
    fn build_setup_message(&self) -> ClientMessage {
        ClientMessage::setup(
            self.model.clone(),
            self.config.response_modalities.clone(),
            Some(self.voice.as_str()),
            self.config.instructions.as_deref(),
        )
    }

    /// Read frames until the server acknowledges the setup.
    async fn await_setup_complete<S>(stream: &mut S) -> LiveResult<()>
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        while let Some(msg) = stream.next().await {
            let payload = match msg {
                Ok(Message::Text(text)) => text.as_str().to_owned(),
                Ok(Message::Binary(data)) => String::from_utf8_lossy(&data).into_owned(),
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .unwrap_or_else(|| "no reason given".to_string());
                    return Err(LiveError::ConnectionFailed(format!(
                        "Closed before setup completed: {reason}"
                    )));
                }
                Ok(_) => continue,
                Err(e) => return Err(LiveError::WebSocketError(e.to_string())),
            };

            match serde_json::from_str::<ServerMessage>(&payload) {
                Ok(message) if message.is_setup_complete() => return Ok(()),
                Ok(_) => tracing::debug!("Ignoring Gemini message received before setupComplete"),
                Err(e) => tracing::warn!("Failed to parse Gemini setup response: {}", e),
            }
        }

        Err(LiveError::ConnectionFailed(
            "Stream ended before setup completed".to_string(),
        ))
    }

    /// Handle a server message.
    ///
    /// Every inline audio part of a model turn is forwarded, in order.
    async fn handle_server_message(
        message: ServerMessage,
        audio_cb: &Arc<Mutex<Option<AudioOutputCallback>>>,
        interrupted_cb: &Arc<Mutex<Option<InterruptedCallback>>>,
    ) {
        if let Some(go_away) = &message.go_away {
            tracing::warn!(
                time_left = go_away.time_left.as_deref().unwrap_or("unknown"),
                "Gemini Live server is going away"
            );
        }

        let Some(content) = message.server_content.as_ref() else {
            if message.is_setup_complete() {
                tracing::debug!("Duplicate setupComplete ignored");
            }
            return;
        };

        if let Some(cb) = audio_cb.lock().await.as_ref() {
            for blob in message.audio_parts() {
                match BASE64_STANDARD.decode(&blob.data) {
                    Ok(audio_bytes) => {
                        cb(LiveAudioData {
                            data: Bytes::from(audio_bytes),
                            mime_type: Some(blob.mime_type.clone()).filter(|m| !m.is_empty()),
                        })
                        .await;
                    }
                    Err(e) => {
                        tracing::error!("Failed to decode Gemini audio part: {}", e);
                    }
                }
            }
        }

        if content.interrupted {
            tracing::debug!("Gemini turn interrupted");
            if let Some(cb) = interrupted_cb.lock().await.as_ref() {
                cb().await;
            }
        }

        if content.turn_complete {
            tracing::debug!("Gemini turn complete");
        }
    }

    /// Send a message to the WebSocket task.
    async fn send_message(&self, message: ClientMessage) -> LiveResult<()> {
        let sender = self.ws_sender.lock().await.clone();
        match sender {
            Some(sender) => sender
                .send(message)
                .await
                .map_err(|e| LiveError::WebSocketError(e.to_string())),
            None => Err(LiveError::NotConnected),
        }
    }

    fn spawn_connection_task(
        &self,
        ws_stream: WsStream,
        mut rx: mpsc::Receiver<ClientMessage>,
    ) -> JoinHandle<()> {
        let (mut ws_sink, mut ws_stream) = ws_stream.split();

        let audio_cb = self.audio_callback.clone();
        let interrupted_cb = self.interrupted_callback.clone();
        let error_cb = self.error_callback.clone();
        let state = self.state.clone();
        let ws_sender = self.ws_sender.clone();
        let connected = self.connected.clone();
        let intentional_disconnect = self.intentional_disconnect.clone();

        tokio::spawn(async move {
            let mut failure: Option<LiveError> = None;

            loop {
                tokio::select! {
                    outgoing = rx.recv() => {
                        let Some(message) = outgoing else {
                            // Owner dropped the sender: close gracefully.
                            if let Err(e) = ws_sink.send(Message::Close(None)).await {
                                tracing::debug!("Failed to send close frame: {}", e);
                            }
                            break;
                        };

                        let json = match serde_json::to_string(&message) {
                            Ok(j) => j,
                            Err(e) => {
                                tracing::error!("Failed to serialize message: {}", e);
                                continue;
                            }
                        };

                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            tracing::error!("Failed to send WebSocket message: {}", e);
                            failure = Some(LiveError::WebSocketError(e.to_string()));
                            break;
                        }
                    }

                    incoming = ws_stream.next() => {
                        let payload = match incoming {
                            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                            Some(Ok(Message::Binary(data))) => {
                                match std::str::from_utf8(&data) {
                                    Ok(text) => text.to_owned(),
                                    Err(e) => {
                                        tracing::warn!("Non UTF-8 binary frame from Gemini: {}", e);
                                        continue;
                                    }
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                let reason = frame
                                    .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                                    .unwrap_or_else(|| "no close frame".to_string());
                                tracing::info!("Gemini Live WebSocket closed by server: {}", reason);
                                failure = Some(LiveError::SessionClosed(reason));
                                break;
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    tracing::error!("Failed to send pong: {}", e);
                                }
                                continue;
                            }
                            Some(Ok(_)) => continue,
                            Some(Err(e)) => {
                                tracing::error!("Gemini Live WebSocket error: {}", e);
                                failure = Some(LiveError::WebSocketError(e.to_string()));
                                break;
                            }
                            None => {
                                failure = Some(LiveError::SessionClosed(
                                    "stream ended".to_string(),
                                ));
                                break;
                            }
                        };

                        match serde_json::from_str::<ServerMessage>(&payload) {
                            Ok(message) => {
                                Self::handle_server_message(message, &audio_cb, &interrupted_cb)
                                    .await;
                            }
                            Err(e) => {
                                tracing::warn!("Failed to parse Gemini message: {}", e);
                            }
                        }
                    }
                }
            }

            connected.store(false, Ordering::SeqCst);
            *ws_sender.lock().await = None;

            if intentional_disconnect.load(Ordering::SeqCst) {
                *state.write().await = ConnectionState::Disconnected;
            } else {
                *state.write().await = ConnectionState::Failed;
                if let Some(err) = failure
                    && let Some(cb) = error_cb.lock().await.as_ref()
                {
                    cb(err).await;
                }
            }

            tracing::info!("Gemini Live connection task ended");
        })
    }
}

fn map_handshake_error(err: tungstenite::Error) -> LiveError {
    match err {
        tungstenite::Error::Http(response)
            if response.status() == http::StatusCode::UNAUTHORIZED
                || response.status() == http::StatusCode::FORBIDDEN =>
        {
            LiveError::AuthenticationFailed(format!("HTTP {}", response.status()))
        }
        other => LiveError::ConnectionFailed(other.to_string()),
    }
}

#[async_trait]
impl BaseLiveSession for GeminiLive {
    fn new(config: LiveSessionConfig) -> LiveResult<Self> {
        if config.api_key.is_empty() {
            return Err(LiveError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        let endpoint = config.endpoint.as_deref().unwrap_or(GEMINI_LIVE_URL);
        let endpoint = Url::parse(endpoint).map_err(|e| {
            LiveError::InvalidConfiguration(format!("Invalid endpoint '{endpoint}': {e}"))
        })?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(LiveError::InvalidConfiguration(format!(
                "Endpoint must use ws:// or wss://, got {}",
                endpoint.scheme()
            )));
        }

        let model = qualified_model_name(&config.model);
        let voice = config
            .voice
            .as_deref()
            .map(GeminiVoice::from_str_or_default)
            .unwrap_or_default();
        let input_mime_type = if config.input_mime_type.is_empty() {
            pcm_mime_type(DEFAULT_INPUT_SAMPLE_RATE)
        } else {
            config.input_mime_type.clone()
        };

        Ok(Self {
            config,
            model,
            voice,
            input_mime_type,
            endpoint,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            connected: Arc::new(AtomicBool::new(false)),
            ws_sender: Arc::new(Mutex::new(None)),
            audio_callback: Arc::new(Mutex::new(None)),
            interrupted_callback: Arc::new(Mutex::new(None)),
            error_callback: Arc::new(Mutex::new(None)),
            connection_handle: Arc::new(Mutex::new(None)),
            intentional_disconnect: Arc::new(AtomicBool::new(false)),
        })
    }

    async fn connect(&mut self) -> LiveResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.intentional_disconnect.store(false, Ordering::SeqCst);
        *self.state.write().await = ConnectionState::Connecting;

        let deadline = Instant::now() + Duration::from_millis(self.config.connect_timeout_ms);
        let result = self.establish(deadline).await;

        match result {
            Ok((ws_stream, tx, rx)) => {
                *self.ws_sender.lock().await = Some(tx);
                self.connected.store(true, Ordering::SeqCst);
                *self.state.write().await = ConnectionState::Connected;
                let handle = self.spawn_connection_task(ws_stream, rx);
                *self.connection_handle.lock().await = Some(handle);
                tracing::info!(model = %self.model, voice = %self.voice, "Connected to Gemini Live API");
                Ok(())
            }
            Err(e) => {
                *self.state.write().await = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) -> LiveResult<()> {
        self.intentional_disconnect.store(true, Ordering::SeqCst);

        // Dropping the sender makes the task send a close frame and exit.
        *self.ws_sender.lock().await = None;

        if let Some(mut handle) = self.connection_handle.lock().await.take() {
            if tokio::time::timeout(DISCONNECT_GRACE, &mut handle)
                .await
                .is_err()
            {
                tracing::debug!("Gemini Live task did not stop in time, aborting");
                handle.abort();
            }
            tracing::info!("Disconnected from Gemini Live API");
        }

        self.connected.store(false, Ordering::SeqCst);
        *self.state.write().await = ConnectionState::Disconnected;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn get_connection_state(&self) -> ConnectionState {
        match self.state.try_read() {
            Ok(state) => *state,
            Err(_) if self.connected.load(Ordering::SeqCst) => ConnectionState::Connected,
            Err(_) => ConnectionState::Disconnected,
        }
    }

    async fn send_audio(&mut self, audio_data: Bytes) -> LiveResult<()> {
        if !self.is_ready() {
            return Err(LiveError::NotConnected);
        }

        let message = ClientMessage::audio_chunk(&audio_data, &self.input_mime_type);
        self.send_message(message).await
    }

    fn on_audio(&mut self, callback: AudioOutputCallback) -> LiveResult<()> {
        // try_lock registers synchronously so no output arrives before the callback is set
        if let Ok(mut guard) = self.audio_callback.try_lock() {
            *guard = Some(callback);
        } else {
            let cb = self.audio_callback.clone();
            tokio::spawn(async move {
                *cb.lock().await = Some(callback);
            });
        }
        Ok(())
    }

    fn on_interrupted(&mut self, callback: InterruptedCallback) -> LiveResult<()> {
        if let Ok(mut guard) = self.interrupted_callback.try_lock() {
            *guard = Some(callback);
        } else {
            let cb = self.interrupted_callback.clone();
            tokio::spawn(async move {
                *cb.lock().await = Some(callback);
            });
        }
        Ok(())
    }

    fn on_error(&mut self, callback: LiveErrorCallback) -> LiveResult<()> {
        if let Ok(mut guard) = self.error_callback.try_lock() {
            *guard = Some(callback);
        } else {
            let cb = self.error_callback.clone();
            tokio::spawn(async move {
                *cb.lock().await = Some(callback);
            });
        }
        Ok(())
    }

    fn get_provider_info(&self) -> serde_json::Value {
        serde_json::json!({
            "provider": "gemini",
            "api_type": "WebSocket BidiGenerateContent",
            "endpoint": self.endpoint.as_str(),
            "model": self.model,
            "supported_voices": GeminiVoice::all()
                .iter()
                .map(|v| v.as_str())
                .collect::<Vec<_>>(),
            "input_mime_type": self.input_mime_type,
            "output_sample_rate": GEMINI_LIVE_OUTPUT_SAMPLE_RATE,
            "features": {
                "bidirectional_audio": true,
                "barge_in": true,
                "server_vad": true
            },
            "documentation": "https://ai.google.dev/gemini-api/docs/live"
        })
    }
}

impl GeminiLive {
    /// Perform the handshake and setup exchange before `deadline`.
    async fn establish(
        &self,
        deadline: Instant,
    ) -> LiveResult<(
        WsStream,
        mpsc::Sender<ClientMessage>,
        mpsc::Receiver<ClientMessage>,
    )> {
        let url = self.build_ws_url();

        let (mut ws_stream, _response) =
            tokio::time::timeout_at(deadline, tokio_tungstenite::connect_async(url.as_str()))
                .await
                .map_err(|_| LiveError::Timeout("WebSocket handshake".to_string()))?
                .map_err(map_handshake_error)?;

        let setup = serde_json::to_string(&self.build_setup_message())
            .map_err(|e| LiveError::SerializationError(e.to_string()))?;
        ws_stream
            .send(Message::Text(setup.into()))
            .await
            .map_err(|e| LiveError::WebSocketError(e.to_string()))?;

        tokio::time::timeout_at(deadline, Self::await_setup_complete(&mut ws_stream))
            .await
            .map_err(|_| LiveError::Timeout("waiting for setupComplete".to_string()))??;

        let (tx, rx) = mpsc::channel::<ClientMessage>(WS_CHANNEL_CAPACITY);
        Ok((ws_stream, tx, rx))
    }
}

impl Drop for GeminiLive {
    fn drop(&mut self) {
        self.intentional_disconnect.store(true, Ordering::SeqCst);
        if let Ok(mut guard) = self.connection_handle.try_lock()
            && let Some(handle) = guard.take()
        {
            handle.abort();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
