//! End-to-end media stream tests
//!
//! Starts the real server on an ephemeral port, points it at the Gemini Live
//! mock and drives `/media-stream` the way Twilio does: `connected`, `start`,
//! `media`..., `stop`.

mod mock_providers;

use axum::middleware;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use mock_providers::{MockGeminiBehavior, MockGeminiServer};
use salesvoice_gateway::{
    ServerConfig, middleware::connection_limit_middleware, routes, state::AppState,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(3);

struct TestServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn gateway_config(gemini_url: &str) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.gemini_api_key = Some("mock-key".to_string());
    config.gemini_live_url = Some(gemini_url.to_string());
    config.bridge.session_open_timeout_ms = 2_000;
    config
}

async fn start_gateway(config: ServerConfig) -> TestServer {
    let state = AppState::new(config).await;

    let media_routes = routes::media_stream::create_media_stream_router().layer(
        middleware::from_fn_with_state(state.clone(), connection_limit_middleware),
    );
    let app = routes::api::create_api_router()
        .merge(media_routes)
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer {
        addr,
        state,
        handle,
    }
}

async fn connect(server: &TestServer) -> Result<Client, WsError> {
    connect_async(format!("ws://{}/media-stream", server.addr))
        .await
        .map(|(client, _response)| client)
}

async fn send_json(client: &mut Client, value: Value) {
    client
        .send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

async fn start_stream(client: &mut Client, stream_sid: &str) {
    send_json(
        client,
        json!({"event": "connected", "protocol": "Call", "version": "1.0.0"}),
    )
    .await;
    send_json(
        client,
        json!({
            "event": "start",
            "sequenceNumber": "1",
            "start": {
                "streamSid": stream_sid,
                "callSid": "CA-e2e",
                "accountSid": "AC-e2e",
                "tracks": ["inbound"],
                "mediaFormat": {"encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1}
            },
            "streamSid": stream_sid
        }),
    )
    .await;
}

async fn send_media(client: &mut Client, stream_sid: &str, audio: &[u8]) {
    send_json(
        client,
        json!({
            "event": "media",
            "streamSid": stream_sid,
            "media": {"track": "inbound", "payload": BASE64_STANDARD.encode(audio)}
        }),
    )
    .await;
}

/// Next JSON text frame from the gateway, or `None` once it closed.
async fn next_json(client: &mut Client) -> Option<Value> {
    loop {
        let message = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("gateway went quiet")?;
        match message {
            Ok(Message::Text(text)) => return Some(serde_json::from_str(text.as_str()).unwrap()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

async fn wait_for_release(state: &AppState) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if state.ws_connection_count() == 0 {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_call_audio_round_trip() {
    let gemini = MockGeminiServer::start(MockGeminiBehavior::default()).await;
    let server = start_gateway(gateway_config(&gemini.url)).await;

    let mut client = connect(&server).await.unwrap();
    start_stream(&mut client, "MZ-e2e").await;
    send_media(&mut client, "MZ-e2e", &[0x7F, 0x7E, 0x7D]).await;
    send_media(&mut client, "MZ-e2e", &[0x01, 0x02]).await;

    // Passthrough: the mock echoes each chunk and it comes back unchanged
    let first = next_json(&mut client).await.unwrap();
    assert_eq!(first["event"], "media");
    assert_eq!(first["streamSid"], "MZ-e2e");
    assert_eq!(first["media"]["payload"], BASE64_STANDARD.encode([0x7Fu8, 0x7E, 0x7D]));

    let second = next_json(&mut client).await.unwrap();
    assert_eq!(second["media"]["payload"], BASE64_STANDARD.encode([0x01u8, 0x02]));

    let setups = gemini.state.setups();
    assert_eq!(setups.len(), 1);
    assert_eq!(
        gemini.state.chunks()[0].mime_type,
        "audio/pcm;rate=8000"
    );

    send_json(&mut client, json!({"event": "stop", "streamSid": "MZ-e2e"})).await;
    assert_eq!(next_json(&mut client).await, None);

    assert!(gemini.wait_for_client_close(1, WAIT).await);
    assert!(wait_for_release(&server.state).await);
}

#[tokio::test]
async fn test_barge_in_sends_clear() {
    let gemini = MockGeminiServer::start(MockGeminiBehavior {
        echo_audio: false,
        interrupt_after_chunks: Some(1),
        ..Default::default()
    })
    .await;
    let server = start_gateway(gateway_config(&gemini.url)).await;

    let mut client = connect(&server).await.unwrap();
    start_stream(&mut client, "MZ-barge").await;
    send_media(&mut client, "MZ-barge", &[0x10]).await;

    let message = next_json(&mut client).await.unwrap();
    assert_eq!(message, json!({"event": "clear", "streamSid": "MZ-barge"}));

    client.close(None).await.unwrap();
    assert!(wait_for_release(&server.state).await);
}

#[tokio::test]
async fn test_session_open_failure_closes_media_stream() {
    let gemini = MockGeminiServer::start(MockGeminiBehavior {
        reject_status: Some(401),
        ..Default::default()
    })
    .await;
    let server = start_gateway(gateway_config(&gemini.url)).await;

    // The session is opened on connect, before any Twilio event arrives
    let mut client = connect(&server).await.unwrap();

    assert_eq!(next_json(&mut client).await, None);
    assert!(wait_for_release(&server.state).await);
}

#[tokio::test]
async fn test_gemini_drop_closes_media_stream() {
    let gemini = MockGeminiServer::start(MockGeminiBehavior {
        echo_audio: false,
        drop_after_chunks: Some(1),
        ..Default::default()
    })
    .await;
    let server = start_gateway(gateway_config(&gemini.url)).await;

    let mut client = connect(&server).await.unwrap();
    start_stream(&mut client, "MZ-drop").await;
    send_media(&mut client, "MZ-drop", &[0x20]).await;

    assert_eq!(next_json(&mut client).await, None);
    assert!(wait_for_release(&server.state).await);
}

#[tokio::test]
async fn test_per_ip_limit_rejects_then_releases() {
    let gemini = MockGeminiServer::start(MockGeminiBehavior::default()).await;
    let mut config = gateway_config(&gemini.url);
    config.max_connections_per_ip = 1;
    let server = start_gateway(config).await;

    let mut first = connect(&server).await.unwrap();

    match connect(&server).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 429),
        Err(other) => panic!("Expected HTTP rejection, got {other:?}"),
        Ok(_) => panic!("Second connection from the same IP was admitted"),
    }
    assert_eq!(server.state.ws_connection_count(), 1);

    first.close(None).await.unwrap();
    assert!(wait_for_release(&server.state).await);

    let mut again = connect(&server).await.unwrap();
    again.close(None).await.unwrap();
}
