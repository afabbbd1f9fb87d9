//! Call bridge: relays audio between a telephony media stream and a live
//! generative-audio session.
//!
//! # Architecture
//!
//! - `Bridge` - one per call, a single task owning all per-call state
//! - `SessionManager` - `Connecting → Open → Closed` lifecycle of the live
//!   session with a bounded buffer for early frames
//! - `BridgeConfig` - buffering, timeout, malformed-message and reconnect policy

mod buffer;
mod config;
mod orchestrator;
mod session;

pub use buffer::InboundBuffer;
pub use config::{
    BridgeConfig, DEFAULT_MALFORMED_CLOSE_THRESHOLD, DEFAULT_MAX_BUFFERED_FRAMES,
    DEFAULT_SESSION_OPEN_TIMEOUT_MS, MalformedMessagePolicy,
};
pub use orchestrator::{Bridge, BridgeOutcome, BridgeStats, TeardownReason};
pub use session::{OpenTask, SendOutcome, SessionEvent, SessionManager, SessionState, spawn_open};
