use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::core::audio::AudioTranscoder;
use crate::core::bridge::Bridge;
use crate::core::live::GEMINI_LIVE_OUTPUT_SAMPLE_RATE;
use crate::core::telephony::{InboundFrame, TelephonyChannel, TelephonyRoute};
use crate::middleware::{ClientIp, ConnectionGuard};
use crate::state::AppState;

/// Outbound frames queued for the socket writer
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Twilio media messages are small; anything near this is not a media stream
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Time the writer gets to flush the close frame after the bridge ends
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Media stream WebSocket handler
///
/// The connection slot reserved by the connection-limit middleware is tied
/// to the socket task and released when it ends.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    client_ip: Option<Extension<ClientIp>>,
) -> Response {
    let guard = client_ip.map(|Extension(ClientIp(ip))| ConnectionGuard::new(state.clone(), ip));

    debug!("Media stream connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_media_socket(socket, state, guard))
}

fn to_inbound_frame(message: Result<Message, axum::Error>) -> Option<InboundFrame> {
    match message {
        Ok(Message::Text(text)) => Some(InboundFrame::Text(text.as_str().to_owned())),
        Ok(Message::Binary(data)) => Some(InboundFrame::Binary(data)),
        Ok(Message::Close(_)) => Some(InboundFrame::Closed),
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
        Err(e) => Some(InboundFrame::Error(e.to_string())),
    }
}

async fn handle_media_socket(
    socket: WebSocket,
    app_state: Arc<AppState>,
    guard: Option<ConnectionGuard>,
) {
    let call_id = Uuid::new_v4();
    let span = info_span!(
        "bridge",
        call_id = %call_id,
        stream_sid = tracing::field::Empty,
        call_sid = tracing::field::Empty,
    );

    async move {
        info!("Media stream connected");

        let (mut sender, receiver) = socket.split();
        let (route_tx, mut route_rx) = mpsc::channel::<TelephonyRoute>(CHANNEL_BUFFER_SIZE);

        // Writer task: the only owner of the socket sink
        let mut sender_task = tokio::spawn(
            async move {
                while let Some(route) = route_rx.recv().await {
                    let result = match route {
                        TelephonyRoute::Text(text) => sender.send(Message::Text(text.into())).await,
                        TelephonyRoute::Close => {
                            debug!("Closing media stream socket");
                            let _ = sender.send(Message::Close(None)).await;
                            break;
                        }
                    };

                    if let Err(e) = result {
                        error!("Failed to write to media stream: {}", e);
                        break;
                    }
                }
            }
            .in_current_span(),
        );

        let config = &app_state.config;
        let transcoder = AudioTranscoder::new(
            config.audio_transcoding,
            GEMINI_LIVE_OUTPUT_SAMPLE_RATE,
            config.telephony_sample_rate,
        );
        let bridge = Bridge::new(
            TelephonyChannel::new(route_tx),
            app_state.live_factory.clone(),
            config.live_session_config(),
            config.bridge.clone(),
        )
        .with_transcoder(transcoder);

        let inbound = receiver.filter_map(|message| async move { to_inbound_frame(message) });
        let inbound = std::pin::pin!(inbound);

        let outcome = bridge.run(inbound).await;

        if outcome.reason.is_failure() {
            warn!(
                reason = %outcome.reason,
                stream_sid = outcome.stream_sid.as_deref().unwrap_or(""),
                stats = ?outcome.stats,
                "Bridge ended with failure"
            );
        } else {
            info!(
                reason = %outcome.reason,
                stream_sid = outcome.stream_sid.as_deref().unwrap_or(""),
                stats = ?outcome.stats,
                "Bridge ended"
            );
        }

        if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut sender_task)
            .await
            .is_err()
        {
            debug!("Media stream writer did not finish in time, aborting");
            sender_task.abort();
        }

        drop(guard);
    }
    .instrument(span)
    .await
}
