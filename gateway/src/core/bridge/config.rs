//! Per-bridge policy knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default bound on frames buffered while the live session is connecting.
///
/// Twilio sends one 20ms frame per message, so this is five seconds of audio.
pub const DEFAULT_MAX_BUFFERED_FRAMES: usize = 250;

/// Default time allowed for the live session to become ready.
pub const DEFAULT_SESSION_OPEN_TIMEOUT_MS: u64 = 10_000;

/// Default number of consecutive malformed messages tolerated under the
/// `close` policy.
pub const DEFAULT_MALFORMED_CLOSE_THRESHOLD: u32 = 5;

/// What to do with inbound telephony messages that cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedMessagePolicy {
    /// Log and drop the message, keep the call up
    #[default]
    Drop,
    /// Treat repeated malformed messages as protocol desync and end the call
    Close,
}

impl MalformedMessagePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Some(Self::Drop),
            "close" => Some(Self::Close),
            _ => None,
        }
    }
}

/// Bridge behaviour configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Frames held while the live session is connecting; newer frames past
    /// this bound are dropped
    pub max_buffered_frames: usize,
    /// Deadline for the live session to become ready
    pub session_open_timeout_ms: u64,
    pub malformed_policy: MalformedMessagePolicy,
    /// Consecutive malformed messages that close the call under `Close`
    pub malformed_close_threshold: u32,
    /// Fresh live sessions opened after one is lost mid-call
    pub max_session_reconnects: u32,
    /// Flush Twilio's playback buffer when the caller barges in
    pub clear_on_interrupt: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_buffered_frames: DEFAULT_MAX_BUFFERED_FRAMES,
            session_open_timeout_ms: DEFAULT_SESSION_OPEN_TIMEOUT_MS,
            malformed_policy: MalformedMessagePolicy::Drop,
            malformed_close_threshold: DEFAULT_MALFORMED_CLOSE_THRESHOLD,
            max_session_reconnects: 0,
            clear_on_interrupt: true,
        }
    }
}

impl BridgeConfig {
    pub fn session_open_timeout(&self) -> Duration {
        Duration::from_millis(self.session_open_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.max_buffered_frames, 250);
        assert_eq!(config.session_open_timeout(), Duration::from_secs(10));
        assert_eq!(config.malformed_policy, MalformedMessagePolicy::Drop);
        assert_eq!(config.max_session_reconnects, 0);
        assert!(config.clear_on_interrupt);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            MalformedMessagePolicy::parse("CLOSE"),
            Some(MalformedMessagePolicy::Close)
        );
        assert_eq!(
            MalformedMessagePolicy::parse(" drop "),
            Some(MalformedMessagePolicy::Drop)
        );
        assert_eq!(MalformedMessagePolicy::parse("explode"), None);
    }

    #[test]
    fn test_partial_deserialize() {
        let config: BridgeConfig =
            serde_yaml::from_str("max_buffered_frames: 10\nmalformed_policy: close\n").unwrap();
        assert_eq!(config.max_buffered_frames, 10);
        assert_eq!(config.malformed_policy, MalformedMessagePolicy::Close);
        assert_eq!(config.session_open_timeout_ms, DEFAULT_SESSION_OPEN_TIMEOUT_MS);
    }
}
