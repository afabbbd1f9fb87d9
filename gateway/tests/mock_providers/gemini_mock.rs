//! WebSocket mock of the Gemini Live API
//!
//! Accepts the `setup` message, answers `setupComplete`, and echoes every
//! `realtimeInput` media chunk back as a model-turn audio part. Behaviour can
//! be tuned per test (setup delay, barge-in, dropped connections, auth
//! rejection).

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// Mime type the mock reports for its audio output
pub const MOCK_OUTPUT_MIME: &str = "audio/pcm;rate=24000";

/// How the mock behaves on each connection
#[derive(Debug, Clone)]
pub struct MockGeminiBehavior {
    /// Delay before answering `setupComplete`
    pub setup_delay: Duration,
    /// Never answer the setup message
    pub withhold_setup_complete: bool,
    /// Echo each inbound chunk back as model audio
    pub echo_audio: bool,
    /// Send `interrupted` after this many inbound chunks
    pub interrupt_after_chunks: Option<usize>,
    /// Drop the socket (no close frame) after this many inbound chunks
    pub drop_after_chunks: Option<usize>,
    /// Reject the WebSocket handshake with this HTTP status
    pub reject_status: Option<u16>,
}

impl Default for MockGeminiBehavior {
    fn default() -> Self {
        Self {
            setup_delay: Duration::ZERO,
            withhold_setup_complete: false,
            echo_audio: true,
            interrupt_after_chunks: None,
            drop_after_chunks: None,
            reject_status: None,
        }
    }
}

/// One media chunk received from the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedChunk {
    pub connection: usize,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// What the mock observed
#[derive(Debug, Default)]
pub struct MockGeminiState {
    pub connections: AtomicUsize,
    pub api_keys: Mutex<Vec<String>>,
    pub setups: Mutex<Vec<Value>>,
    pub chunks: Mutex<Vec<ReceivedChunk>>,
    pub closed_by_client: AtomicUsize,
}

impl MockGeminiState {
    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().unwrap().len()
    }

    pub fn chunks(&self) -> Vec<ReceivedChunk> {
        self.chunks.lock().unwrap().clone()
    }

    pub fn setups(&self) -> Vec<Value> {
        self.setups.lock().unwrap().clone()
    }
}

/// Running mock server
pub struct MockGeminiServer {
    pub url: String,
    pub state: Arc<MockGeminiState>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockGeminiServer {
    /// Bind on an ephemeral port and start accepting connections.
    pub async fn start(behavior: MockGeminiBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockGeminiState::default());

        let server_state = state.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = server_state.clone();
                let behavior = behavior.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, state, behavior).await;
                });
            }
        });

        Self {
            url: format!("ws://{addr}/ws/live"),
            state,
            handle,
        }
    }

    /// Wait until `count` chunks have arrived or the timeout expires.
    pub async fn wait_for_chunks(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.state.chunk_count() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.state.chunk_count() >= count
    }

    /// Wait until `count` connections were closed by the client.
    pub async fn wait_for_client_close(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.state.closed_by_client.load(Ordering::SeqCst) >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

impl Drop for MockGeminiServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn model_audio(data: &str) -> Message {
    let payload = json!({
        "serverContent": {
            "modelTurn": {
                "parts": [
                    {"inlineData": {"mimeType": MOCK_OUTPUT_MIME, "data": data}}
                ]
            }
        }
    });
    Message::Text(payload.to_string().into())
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<MockGeminiState>,
    behavior: MockGeminiBehavior,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let key_state = state.clone();
    let reject_status = behavior.reject_status;
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let key = request
            .uri()
            .query()
            .and_then(|q| q.split('&').find_map(|pair| pair.strip_prefix("key=")))
            .unwrap_or_default()
            .to_string();
        key_state.api_keys.lock().unwrap().push(key);

        if let Some(status) = reject_status {
            let rejection = http::Response::builder()
                .status(status)
                .body(Some("rejected by mock".to_string()))
                .unwrap();
            return Err(rejection);
        }
        Ok(response)
    };

    let ws_stream = accept_hdr_async(stream, callback).await?;
    let connection = state.connections.fetch_add(1, Ordering::SeqCst) + 1;
    let (mut write, mut read) = ws_stream.split();

    let mut chunk_count = 0usize;

    while let Some(msg) = read.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Close(_)) => {
                state.closed_by_client.fetch_add(1, Ordering::SeqCst);
                break;
            }
            Ok(_) => continue,
            Err(_) => break,
        };

        let value: Value = serde_json::from_str(&text)?;

        if let Some(setup) = value.get("setup") {
            state.setups.lock().unwrap().push(setup.clone());
            if behavior.withhold_setup_complete {
                continue;
            }
            tokio::time::sleep(behavior.setup_delay).await;
            write
                .send(Message::Text(json!({"setupComplete": {}}).to_string().into()))
                .await?;
            continue;
        }

        let Some(chunks) = value
            .pointer("/realtimeInput/mediaChunks")
            .and_then(|c| c.as_array())
        else {
            continue;
        };

        for chunk in chunks {
            let mime_type = chunk["mimeType"].as_str().unwrap_or_default().to_string();
            let encoded = chunk["data"].as_str().unwrap_or_default();
            let data = BASE64_STANDARD.decode(encoded).unwrap_or_default();
            state.chunks.lock().unwrap().push(ReceivedChunk {
                connection,
                mime_type,
                data,
            });
            chunk_count += 1;

            if behavior.echo_audio {
                write.send(model_audio(encoded)).await?;
            }

            if behavior.interrupt_after_chunks == Some(chunk_count) {
                write
                    .send(Message::Text(
                        json!({"serverContent": {"interrupted": true}})
                            .to_string()
                            .into(),
                    ))
                    .await?;
            }

            if behavior.drop_after_chunks == Some(chunk_count) {
                // Drop without a close frame
                return Ok(());
            }
        }
    }

    Ok(())
}
