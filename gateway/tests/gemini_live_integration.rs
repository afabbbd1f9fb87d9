//! Integration tests for the Gemini Live client
//!
//! These tests run the client against a local mock of the
//! `BidiGenerateContent` WebSocket and verify:
//! - setup message contents (model, voice, instructions, modality)
//! - audio chunks are sent with the configured mime type
//! - model audio and barge-in reach the registered callbacks
//! - an unexpected drop is reported once, an intentional disconnect is not
//! - handshake rejection and setup timeouts surface as typed errors

mod mock_providers;

use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

use mock_providers::gemini_mock::MOCK_OUTPUT_MIME;
use mock_providers::{MockGeminiBehavior, MockGeminiServer};
use salesvoice_gateway::core::live::{
    BaseLiveSession, ConnectionState, GeminiLive, LiveAudioData, LiveError, LiveSessionConfig,
    create_live_session, get_supported_live_providers,
};

fn live_config(endpoint: &str) -> LiveSessionConfig {
    LiveSessionConfig {
        api_key: "mock-key".to_string(),
        provider: "gemini".to_string(),
        model: "gemini-test-model".to_string(),
        voice: Some("Kore".to_string()),
        instructions: Some("You are Alex.".to_string()),
        input_mime_type: "audio/pcm;rate=8000".to_string(),
        endpoint: Some(endpoint.to_string()),
        connect_timeout_ms: 2_000,
        ..Default::default()
    }
}

#[test]
fn test_gemini_in_supported_live_providers() {
    let providers = get_supported_live_providers();
    assert!(providers.contains(&"gemini"));
}

#[tokio::test]
async fn test_create_live_session_by_name() {
    let config = live_config("ws://127.0.0.1:1/ws");
    let session = create_live_session("Gemini", config).unwrap();
    assert_eq!(session.get_provider_info()["provider"], "gemini");
    assert!(!session.is_ready());
    assert_eq!(session.get_connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_connect_sends_setup() {
    let server = MockGeminiServer::start(MockGeminiBehavior::default()).await;
    let mut session = GeminiLive::new(live_config(&server.url)).unwrap();

    session.connect().await.unwrap();
    assert!(session.is_ready());
    assert_eq!(session.get_connection_state(), ConnectionState::Connected);

    let setups = server.state.setups();
    assert_eq!(setups.len(), 1);
    let setup = &setups[0];
    assert_eq!(setup["model"], "models/gemini-test-model");
    assert_eq!(setup["generationConfig"]["responseModalities"][0], "AUDIO");
    assert_eq!(
        setup["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
        "Kore"
    );
    assert_eq!(setup["systemInstruction"]["parts"][0]["text"], "You are Alex.");

    assert_eq!(
        server.state.api_keys.lock().unwrap().as_slice(),
        &["mock-key".to_string()]
    );

    session.disconnect().await.unwrap();
    assert_eq!(session.get_connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_audio_round_trip_through_callbacks() {
    let server = MockGeminiServer::start(MockGeminiBehavior::default()).await;
    let mut session = GeminiLive::new(live_config(&server.url)).unwrap();

    let (audio_tx, mut audio_rx) = mpsc::unbounded_channel::<LiveAudioData>();
    session
        .on_audio(Arc::new(move |audio: LiveAudioData| {
            let _ = audio_tx.send(audio);
            Box::pin(async {})
        }))
        .unwrap();

    session.connect().await.unwrap();

    for frame in [&[1u8, 2, 3][..], &[4, 5][..], &[6][..]] {
        session.send_audio(Bytes::copy_from_slice(frame)).await.unwrap();
    }

    assert!(server.wait_for_chunks(3, Duration::from_secs(2)).await);
    let chunks = server.state.chunks();
    assert_eq!(chunks[0].data, vec![1, 2, 3]);
    assert_eq!(chunks[1].data, vec![4, 5]);
    assert_eq!(chunks[2].data, vec![6]);
    assert!(chunks.iter().all(|c| c.mime_type == "audio/pcm;rate=8000"));

    // Echoed model audio arrives in order
    for expected in [&[1u8, 2, 3][..], &[4, 5][..], &[6][..]] {
        let audio = tokio::time::timeout(Duration::from_secs(2), audio_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(audio.data.as_ref(), expected);
        assert_eq!(audio.mime_type.as_deref(), Some(MOCK_OUTPUT_MIME));
    }

    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_interrupted_callback() {
    let server = MockGeminiServer::start(MockGeminiBehavior {
        echo_audio: false,
        interrupt_after_chunks: Some(1),
        ..Default::default()
    })
    .await;
    let mut session = GeminiLive::new(live_config(&server.url)).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel::<()>();
    session
        .on_interrupted(Arc::new(move || {
            let _ = tx.send(());
            Box::pin(async {})
        }))
        .unwrap();

    session.connect().await.unwrap();
    session.send_audio(Bytes::from_static(&[9, 9])).await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();

    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_unexpected_drop_reports_error_once() {
    let server = MockGeminiServer::start(MockGeminiBehavior {
        drop_after_chunks: Some(1),
        echo_audio: false,
        ..Default::default()
    })
    .await;
    let mut session = GeminiLive::new(live_config(&server.url)).unwrap();

    let errors = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel::<LiveError>();
    let counter = errors.clone();
    session
        .on_error(Arc::new(move |error: LiveError| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(error);
            Box::pin(async {})
        }))
        .unwrap();

    session.connect().await.unwrap();
    session.send_audio(Bytes::from_static(&[1])).await.unwrap();

    let error = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        error,
        LiveError::SessionClosed(_) | LiveError::WebSocketError(_)
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert!(!session.is_ready());
    assert_eq!(session.get_connection_state(), ConnectionState::Failed);

    // Sending after the drop is refused, not panicking
    assert!(matches!(
        session.send_audio(Bytes::from_static(&[2])).await,
        Err(LiveError::NotConnected)
    ));
}

#[tokio::test]
async fn test_intentional_disconnect_is_silent() {
    let server = MockGeminiServer::start(MockGeminiBehavior::default()).await;
    let mut session = GeminiLive::new(live_config(&server.url)).unwrap();

    let errors = Arc::new(AtomicUsize::new(0));
    let counter = errors.clone();
    session
        .on_error(Arc::new(move |_error: LiveError| {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {})
        }))
        .unwrap();

    session.connect().await.unwrap();
    session.disconnect().await.unwrap();
    // Idempotent
    session.disconnect().await.unwrap();

    assert!(server.wait_for_client_close(1, Duration::from_secs(2)).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(errors.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_handshake_rejection_is_auth_failure() {
    let server = MockGeminiServer::start(MockGeminiBehavior {
        reject_status: Some(401),
        ..Default::default()
    })
    .await;
    let mut session = GeminiLive::new(live_config(&server.url)).unwrap();

    let result = session.connect().await;
    assert!(matches!(result, Err(LiveError::AuthenticationFailed(_))));
    assert_eq!(session.get_connection_state(), ConnectionState::Failed);
}

#[tokio::test]
async fn test_setup_timeout() {
    let server = MockGeminiServer::start(MockGeminiBehavior {
        withhold_setup_complete: true,
        ..Default::default()
    })
    .await;
    let mut config = live_config(&server.url);
    config.connect_timeout_ms = 200;
    let mut session = GeminiLive::new(config).unwrap();

    let started = std::time::Instant::now();
    let result = session.connect().await;
    assert!(matches!(result, Err(LiveError::Timeout(_))));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!session.is_ready());
}
