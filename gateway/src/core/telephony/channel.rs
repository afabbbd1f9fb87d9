//! Writer side of the telephony media stream.
//!
//! The socket itself is owned by the transport layer: a writer task drains
//! [`TelephonyRoute`]s into it and the reader forwards [`InboundFrame`]s to the
//! bridge. The bridge only ever holds a [`TelephonyChannel`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;

use super::messages::OutboundMessage;

/// One frame read from the telephony socket, as seen by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Text frame (Twilio sends JSON text only)
    Text(String),
    /// Binary frame
    Binary(Bytes),
    /// The peer closed the socket
    Closed,
    /// Transport error; the socket is unusable
    Error(String),
}

/// Work item for the socket writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelephonyRoute {
    /// Serialized JSON text frame
    Text(String),
    /// Send a close frame and stop writing
    Close,
}

/// Handle used to write to the telephony media stream.
///
/// Writes to a closed channel are dropped with a debug log, never an error.
#[derive(Debug, Clone)]
pub struct TelephonyChannel {
    tx: mpsc::Sender<TelephonyRoute>,
    closed: Arc<AtomicBool>,
}

impl TelephonyChannel {
    pub fn new(tx: mpsc::Sender<TelephonyRoute>) -> Self {
        Self {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the channel still accepts writes.
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.tx.is_closed()
    }

    /// Send one audio frame to the caller. Returns whether it was enqueued.
    pub async fn send_audio_frame(&self, stream_sid: &str, audio: &[u8]) -> bool {
        self.send_message(&OutboundMessage::media(stream_sid, audio))
            .await
    }

    /// Ask Twilio to drop audio it has buffered but not yet played.
    pub async fn send_clear(&self, stream_sid: &str) -> bool {
        self.send_message(&OutboundMessage::clear(stream_sid)).await
    }

    /// Close the channel. Only the first call sends a close frame.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.tx.send(TelephonyRoute::Close).await.is_err() {
            tracing::debug!("Telephony writer already gone on close");
        }
    }

    async fn send_message(&self, message: &OutboundMessage) -> bool {
        if !self.is_open() {
            tracing::debug!("Telephony channel closed, dropping outbound message");
            return false;
        }

        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize telephony message: {}", e);
                return false;
            }
        };

        if self.tx.send(TelephonyRoute::Text(json)).await.is_err() {
            tracing::debug!("Telephony writer gone, dropping outbound message");
            self.closed.store(true, Ordering::SeqCst);
            return false;
        }
        true
    }
}
