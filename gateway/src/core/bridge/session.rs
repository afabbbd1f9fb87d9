//! Live session lifecycle for one bridge.
//!
//! The [`SessionManager`] is a small state machine:
//!
//! ```text
//! Connecting ──attach──▶ Open ──close──▶ Closed
//!      └───────────────close───────────────┘
//! ```
//!
//! Opening happens in a separate task ([`spawn_open`]) so the bridge keeps
//! accepting telephony frames; those frames wait in a bounded buffer and are
//! flushed in order on [`attach`](SessionManager::attach).

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::buffer::InboundBuffer;
use crate::core::live::{
    BaseLiveSession, BoxedLiveSession, LiveAudioData, LiveError, LiveResult, LiveSessionConfig,
    LiveSessionFactory,
};

/// Lifecycle state of the bridge's live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Open => write!(f, "open"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// What happened to a frame handed to [`SessionManager::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Passed to the live session
    Forwarded,
    /// Held until the session opens
    Buffered,
    /// Discarded (buffer full, session closed, or provider error)
    Dropped,
}

/// Event posted by a live session's callbacks to its bridge.
///
/// Each carries the generation of the session that produced it so events
/// from a replaced session can be told apart.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Audio { generation: u64, audio: LiveAudioData },
    Interrupted { generation: u64 },
    Lost { generation: u64, error: LiveError },
}

impl SessionEvent {
    pub fn generation(&self) -> u64 {
        match self {
            SessionEvent::Audio { generation, .. }
            | SessionEvent::Interrupted { generation }
            | SessionEvent::Lost { generation, .. } => *generation,
        }
    }
}

/// Handle of a session being opened.
pub type OpenTask = JoinHandle<LiveResult<BoxedLiveSession>>;

/// Owns the bridge's live session and the frames waiting for it.
pub struct SessionManager {
    state: SessionState,
    session: Option<BoxedLiveSession>,
    buffer: InboundBuffer,
    generation: u64,
}

impl SessionManager {
    /// Create a manager in `Connecting` with an empty buffer.
    pub fn new(generation: u64, max_buffered_frames: usize) -> Self {
        Self {
            state: SessionState::Connecting,
            session: None,
            buffer: InboundBuffer::new(max_buffered_frames),
            generation,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Frames currently waiting for the session.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Frames dropped because the buffer was full.
    pub fn overflowed(&self) -> u64 {
        self.buffer.dropped()
    }

    /// Hand one inbound frame to the session. Never fails.
    pub async fn send(&mut self, frame: Bytes) -> SendOutcome {
        match self.state {
            SessionState::Connecting => {
                if self.buffer.push(frame) {
                    SendOutcome::Buffered
                } else {
                    tracing::warn!(
                        capacity = self.buffer.capacity(),
                        dropped = self.buffer.dropped(),
                        "Inbound buffer full while session connecting, dropping frame"
                    );
                    SendOutcome::Dropped
                }
            }
            SessionState::Open => match self.session.as_mut() {
                Some(session) => match session.send_audio(frame).await {
                    Ok(()) => SendOutcome::Forwarded,
                    Err(e) => {
                        tracing::warn!("Failed to forward frame to live session: {}", e);
                        SendOutcome::Dropped
                    }
                },
                None => SendOutcome::Dropped,
            },
            SessionState::Closed => {
                tracing::debug!("Live session closed, dropping frame");
                SendOutcome::Dropped
            }
        }
    }

    /// Install the opened session and flush buffered frames into it in order.
    ///
    /// Returns the number of frames flushed. A session attached to a closed
    /// manager is disconnected immediately.
    pub async fn attach(&mut self, mut session: BoxedLiveSession) -> usize {
        if self.state != SessionState::Connecting {
            tracing::debug!(state = %self.state, "Session attached after close, disconnecting it");
            if let Err(e) = session.disconnect().await {
                tracing::warn!("Failed to disconnect late session: {}", e);
            }
            return 0;
        }

        let mut flushed = 0;
        for frame in self.buffer.drain() {
            match session.send_audio(frame).await {
                Ok(()) => flushed += 1,
                Err(e) => tracing::warn!("Failed to flush buffered frame: {}", e),
            }
        }

        self.session = Some(session);
        self.state = SessionState::Open;
        flushed
    }

    /// Close the session. Returns `true` only for the call that closed it.
    pub async fn close(&mut self) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }

        self.state = SessionState::Closed;
        self.buffer.clear();

        if let Some(mut session) = self.session.take()
            && let Err(e) = session.disconnect().await
        {
            tracing::warn!("Error disconnecting live session: {}", e);
        }
        true
    }
}

/// Register callbacks that post the session's output into `events`.
fn register_callbacks(
    session: &mut dyn BaseLiveSession,
    events: mpsc::UnboundedSender<SessionEvent>,
    generation: u64,
) -> LiveResult<()> {
    let audio_tx = events.clone();
    session.on_audio(Arc::new(move |audio: LiveAudioData| {
        // Send fails only after the bridge is gone; the chunk has nowhere to go.
        let _ = audio_tx.send(SessionEvent::Audio { generation, audio });
        Box::pin(std::future::ready(()))
    }))?;

    let interrupted_tx = events.clone();
    session.on_interrupted(Arc::new(move || {
        let _ = interrupted_tx.send(SessionEvent::Interrupted { generation });
        Box::pin(std::future::ready(()))
    }))?;

    session.on_error(Arc::new(move |error: LiveError| {
        let _ = events.send(SessionEvent::Lost { generation, error });
        Box::pin(std::future::ready(()))
    }))?;

    Ok(())
}

/// Create, wire and connect a live session in the background.
pub fn spawn_open(
    factory: Arc<dyn LiveSessionFactory>,
    config: LiveSessionConfig,
    events: mpsc::UnboundedSender<SessionEvent>,
    generation: u64,
) -> OpenTask {
    tokio::spawn(async move {
        let mut session = factory.create(config)?;
        register_callbacks(session.as_mut(), events, generation)?;
        session.connect().await?;
        Ok(session)
    })
}
