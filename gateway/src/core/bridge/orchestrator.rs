//! Per-call bridge between the telephony media stream and the live session.
//!
//! A [`Bridge`] runs as one task with a single `select!` loop over:
//! - inbound telephony frames,
//! - events posted by the live session's callbacks,
//! - completion of the background session open,
//! - the session open deadline.
//!
//! All bridge state is touched only from that loop, so no locks are needed.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use super::config::{BridgeConfig, MalformedMessagePolicy};
use super::session::{OpenTask, SendOutcome, SessionEvent, SessionManager, spawn_open};
use crate::core::audio::{AudioTranscoder, AudioTranscoding};
use crate::core::live::{BoxedLiveSession, LiveResult, LiveSessionConfig, LiveSessionFactory};
use crate::core::telephony::{InboundFrame, TelephonyChannel, TelephonyEvent, parse_inbound};

/// Why a bridge ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownReason {
    /// The telephony socket closed or its stream ended
    TelephonyClosed,
    /// Twilio sent `stop`
    StreamStopped,
    /// The telephony transport failed
    TransportError(String),
    /// Too many malformed telephony messages under the `close` policy
    ProtocolDesync,
    /// The live session could not be opened
    SessionOpenFailed(String),
    /// The live session did not open before the deadline
    SessionOpenTimeout,
    /// The live session dropped mid-call and no reconnect was left
    SessionLost(String),
}

impl TeardownReason {
    /// Whether the call ended because of a failure rather than a hangup.
    pub fn is_failure(&self) -> bool {
        !matches!(
            self,
            TeardownReason::TelephonyClosed | TeardownReason::StreamStopped
        )
    }
}

impl fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownReason::TelephonyClosed => write!(f, "telephony closed"),
            TeardownReason::StreamStopped => write!(f, "stream stopped"),
            TeardownReason::TransportError(e) => write!(f, "transport error: {e}"),
            TeardownReason::ProtocolDesync => write!(f, "protocol desync"),
            TeardownReason::SessionOpenFailed(e) => write!(f, "session open failed: {e}"),
            TeardownReason::SessionOpenTimeout => write!(f, "session open timed out"),
            TeardownReason::SessionLost(e) => write!(f, "session lost: {e}"),
        }
    }
}

/// Counters collected over the life of a bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Media frames received from telephony
    pub inbound_frames: u64,
    /// Frames passed straight to an open session
    pub forwarded_frames: u64,
    /// Frames held while the session was connecting
    pub buffered_frames: u64,
    /// Frames lost to buffer overflow, closed session or provider errors
    pub dropped_inbound_frames: u64,
    /// Audio chunks written to telephony
    pub outbound_chunks: u64,
    /// Audio chunks with no destination (no `streamSid` yet or channel closed)
    pub dropped_outbound_chunks: u64,
    /// Telephony messages that failed to parse
    pub malformed_messages: u64,
    /// Barge-in events from the live session
    pub interruptions: u64,
    /// Replacement live sessions opened after a loss
    pub session_reconnects: u32,
}

/// Result of [`Bridge::run`].
#[derive(Debug, Clone)]
pub struct BridgeOutcome {
    pub reason: TeardownReason,
    pub stats: BridgeStats,
    pub stream_sid: Option<String>,
    pub call_sid: Option<String>,
}

/// Relays audio for one call.
pub struct Bridge {
    channel: TelephonyChannel,
    factory: Arc<dyn LiveSessionFactory>,
    live_config: LiveSessionConfig,
    config: BridgeConfig,
    transcoder: AudioTranscoder,
    stream_sid: Option<String>,
    call_sid: Option<String>,
    stats: BridgeStats,
    generation: u64,
    malformed_streak: u32,
}

impl Bridge {
    pub fn new(
        channel: TelephonyChannel,
        factory: Arc<dyn LiveSessionFactory>,
        live_config: LiveSessionConfig,
        config: BridgeConfig,
    ) -> Self {
        Self {
            channel,
            factory,
            live_config,
            config,
            transcoder: AudioTranscoder::new(AudioTranscoding::Passthrough, 1, 1),
            stream_sid: None,
            call_sid: None,
            stats: BridgeStats::default(),
            generation: 0,
            malformed_streak: 0,
        }
    }

    /// Use a specific audio transcoder instead of passthrough.
    pub fn with_transcoder(mut self, transcoder: AudioTranscoder) -> Self {
        self.transcoder = transcoder;
        self
    }

    /// Drive the bridge until either side ends the call.
    ///
    /// The live session is opened concurrently with reading `inbound`.
    /// On return the live session has been closed and the telephony channel
    /// has been asked to close.
    pub async fn run<S>(mut self, mut inbound: S) -> BridgeOutcome
    where
        S: Stream<Item = InboundFrame> + Unpin,
    {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<SessionEvent>();

        let mut manager = SessionManager::new(self.generation, self.config.max_buffered_frames);
        let mut open_task = Some(self.open_session(&events_tx));
        let open_timeout = self.config.session_open_timeout();
        let open_deadline = tokio::time::sleep(open_timeout);
        tokio::pin!(open_deadline);
        let mut awaiting_open = true;

        let reason = loop {
            tokio::select! {
                opened = await_open(&mut open_task) => {
                    open_task = None;
                    awaiting_open = false;

                    match opened {
                        Ok(Ok(session)) => {
                            let flushed = manager.attach(session).await;
                            info!(
                                generation = manager.generation(),
                                flushed,
                                "Live session open"
                            );
                        }
                        Ok(Err(e)) => {
                            error!("Failed to open live session: {}", e);
                            break TeardownReason::SessionOpenFailed(e.to_string());
                        }
                        Err(e) => {
                            error!("Live session open task failed: {}", e);
                            break TeardownReason::SessionOpenFailed(e.to_string());
                        }
                    }
                }

                Some(event) = events_rx.recv() => {
                    if event.generation() != manager.generation() {
                        debug!(
                            event_generation = event.generation(),
                            current_generation = manager.generation(),
                            "Ignoring event from a replaced live session"
                        );
                        continue;
                    }

                    match event {
                        SessionEvent::Audio { audio, .. } => {
                            self.forward_to_telephony(audio.data).await;
                        }
                        SessionEvent::Interrupted { .. } => {
                            self.handle_interrupt().await;
                        }
                        SessionEvent::Lost { error, .. } => {
                            warn!("Live session lost: {}", error);
                            manager.close().await;

                            if self.stats.session_reconnects >= self.config.max_session_reconnects {
                                break TeardownReason::SessionLost(error.to_string());
                            }

                            self.stats.session_reconnects += 1;
                            self.generation += 1;
                            info!(
                                attempt = self.stats.session_reconnects,
                                generation = self.generation,
                                "Opening replacement live session"
                            );
                            manager = SessionManager::new(
                                self.generation,
                                self.config.max_buffered_frames,
                            );
                            open_task = Some(self.open_session(&events_tx));
                            open_deadline.as_mut().reset(Instant::now() + open_timeout);
                            awaiting_open = true;
                        }
                    }
                }

                frame = inbound.next() => {
                    let text = match frame {
                        None | Some(InboundFrame::Closed) => {
                            info!("Telephony stream closed");
                            break TeardownReason::TelephonyClosed;
                        }
                        Some(InboundFrame::Error(e)) => {
                            warn!("Telephony transport error: {}", e);
                            break TeardownReason::TransportError(e);
                        }
                        Some(InboundFrame::Binary(data)) => {
                            if self.on_malformed(&format!("unexpected binary frame ({} bytes)", data.len())) {
                                break TeardownReason::ProtocolDesync;
                            }
                            continue;
                        }
                        Some(InboundFrame::Text(text)) => text,
                    };

                    match parse_inbound(&text) {
                        Ok(event) => {
                            self.malformed_streak = 0;
                            if let Some(reason) = self.handle_telephony_event(event, &mut manager).await {
                                break reason;
                            }
                        }
                        Err(e) => {
                            if self.on_malformed(&e.to_string()) {
                                break TeardownReason::ProtocolDesync;
                            }
                        }
                    }
                }

                () = &mut open_deadline, if awaiting_open => {
                    error!(
                        timeout_ms = self.config.session_open_timeout_ms,
                        "Live session did not open in time"
                    );
                    break TeardownReason::SessionOpenTimeout;
                }
            }
        };

        if reason.is_failure() {
            warn!(reason = %reason, "Bridge ending");
        } else {
            info!(reason = %reason, "Bridge ending");
        }

        Self::release_pending_open(open_task).await;
        manager.close().await;
        self.channel.close().await;

        debug!(stats = ?self.stats, "Bridge closed");

        BridgeOutcome {
            reason,
            stats: self.stats,
            stream_sid: self.stream_sid,
            call_sid: self.call_sid,
        }
    }

    fn open_session(&self, events: &mpsc::UnboundedSender<SessionEvent>) -> OpenTask {
        spawn_open(
            self.factory.clone(),
            self.live_config.clone(),
            events.clone(),
            self.generation,
        )
    }

    /// Returns a teardown reason if the event ends the call.
    async fn handle_telephony_event(
        &mut self,
        event: TelephonyEvent,
        manager: &mut SessionManager,
    ) -> Option<TeardownReason> {
        match event {
            TelephonyEvent::Connected => {
                debug!("Telephony media stream connected");
            }
            TelephonyEvent::Start(start) => {
                if let Some(previous) = self.stream_sid.as_deref()
                    && previous != start.stream_sid
                {
                    warn!(previous, current = %start.stream_sid, "Stream restarted with a new streamSid");
                }
                let span = tracing::Span::current();
                span.record("stream_sid", start.stream_sid.as_str());
                if let Some(call_sid) = start.call_sid.as_deref() {
                    span.record("call_sid", call_sid);
                }
                info!(
                    stream_sid = %start.stream_sid,
                    call_sid = ?start.call_sid,
                    media_format = ?start.media_format,
                    "Media stream started"
                );
                self.stream_sid = Some(start.stream_sid);
                self.call_sid = start.call_sid;
            }
            TelephonyEvent::Media(frame) => {
                self.stats.inbound_frames += 1;
                let frame = self.transcoder.inbound(frame);
                match manager.send(frame).await {
                    SendOutcome::Forwarded => self.stats.forwarded_frames += 1,
                    SendOutcome::Buffered => self.stats.buffered_frames += 1,
                    SendOutcome::Dropped => self.stats.dropped_inbound_frames += 1,
                }
            }
            TelephonyEvent::Stop => {
                info!("Telephony sent stop");
                return Some(TeardownReason::StreamStopped);
            }
            TelephonyEvent::Mark(name) => {
                debug!(mark = %name, "Mark played");
            }
            TelephonyEvent::Dtmf(digit) => {
                info!(digit = %digit, "DTMF received");
            }
            TelephonyEvent::Ignored => {
                trace!("Ignoring telephony event");
            }
        }
        None
    }

    async fn forward_to_telephony(&mut self, audio: Bytes) {
        let Some(stream_sid) = self.stream_sid.as_deref() else {
            debug!("No streamSid yet, dropping live audio chunk");
            self.stats.dropped_outbound_chunks += 1;
            return;
        };

        if !self.channel.is_open() {
            debug!("Telephony channel closed, dropping live audio chunk");
            self.stats.dropped_outbound_chunks += 1;
            return;
        }

        let Some(payload) = self.transcoder.outbound(audio) else {
            return;
        };

        if self.channel.send_audio_frame(stream_sid, &payload).await {
            self.stats.outbound_chunks += 1;
        } else {
            self.stats.dropped_outbound_chunks += 1;
        }
    }

    async fn handle_interrupt(&mut self) {
        self.stats.interruptions += 1;
        self.transcoder.reset();

        if !self.config.clear_on_interrupt {
            return;
        }
        if let Some(stream_sid) = self.stream_sid.as_deref() {
            debug!("Caller barged in, clearing telephony playback");
            self.channel.send_clear(stream_sid).await;
        }
    }

    /// Record a malformed message. Returns `true` if the call should end.
    fn on_malformed(&mut self, detail: &str) -> bool {
        self.stats.malformed_messages += 1;
        self.malformed_streak += 1;
        warn!(
            streak = self.malformed_streak,
            "Dropping malformed telephony message: {}", detail
        );

        match self.config.malformed_policy {
            MalformedMessagePolicy::Drop => false,
            MalformedMessagePolicy::Close => {
                self.malformed_streak >= self.config.malformed_close_threshold.max(1)
            }
        }
    }

    /// Make sure a session still being opened does not outlive the bridge.
    async fn release_pending_open(open_task: Option<OpenTask>) {
        let Some(task) = open_task else {
            return;
        };

        if !task.is_finished() {
            task.abort();
            return;
        }

        if let Ok(Ok(mut session)) = task.await
            && let Err(e) = session.disconnect().await
        {
            warn!("Failed to disconnect unused live session: {}", e);
        }
    }
}

/// Wait for the pending open, or forever if there is none.
async fn await_open(
    open_task: &mut Option<OpenTask>,
) -> Result<LiveResult<BoxedLiveSession>, JoinError> {
    match open_task.as_mut() {
        Some(task) => task.await,
        None => std::future::pending().await,
    }
}
