pub mod audio;
pub mod bridge;
pub mod live;
pub mod telephony;

// Re-export commonly used types for convenience
pub use audio::{AudioTranscoder, AudioTranscoding};

pub use bridge::{
    Bridge, BridgeConfig, BridgeOutcome, BridgeStats, MalformedMessagePolicy, SessionManager,
    SessionState, TeardownReason,
};

pub use live::{
    BaseLiveSession, BoxedLiveSession, DefaultLiveSessionFactory, GeminiLive, LiveError,
    LiveProvider, LiveResult, LiveSessionConfig, LiveSessionFactory, create_live_session,
    get_supported_live_providers,
};

pub use telephony::{
    CallError, InboundFrame, TelephonyChannel, TelephonyError, TelephonyEvent, TelephonyRoute,
    TwilioRestClient,
};
