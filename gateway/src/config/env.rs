use std::path::PathBuf;

use super::utils::{env_bool, env_parse, env_string};
use super::{ServerConfig, TlsConfig};
use crate::core::audio::AudioTranscoding;
use crate::core::bridge::{BridgeConfig, MalformedMessagePolicy};

/// Build a configuration from environment variables, with defaults for
/// anything unset.
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = ServerConfig::default();

    config.tls = match (env_string("TLS_CERT_PATH"), env_string("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => {
            return Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".into());
        }
    };

    if let Some(host) = env_string("HOST") {
        config.host = host;
    }
    if let Some(port) = env_parse("PORT")? {
        config.port = port;
    }
    config.public_host = env_string("PUBLIC_HOST");

    config.gemini_api_key = env_string("GEMINI_API_KEY");
    if let Some(provider) = env_string("LIVE_PROVIDER") {
        config.live_provider = provider;
    }
    if let Some(model) = env_string("GEMINI_LIVE_MODEL") {
        config.gemini_model = model;
    }
    if let Some(voice) = env_string("GEMINI_LIVE_VOICE") {
        config.gemini_voice = voice;
    }
    if let Some(instructions) = env_string("AGENT_INSTRUCTIONS") {
        config.agent_instructions = instructions;
    }
    config.gemini_live_url = env_string("GEMINI_LIVE_URL");

    if let Some(rate) = env_parse("TELEPHONY_SAMPLE_RATE")? {
        config.telephony_sample_rate = rate;
    }
    if let Some(raw) = env_string("AUDIO_TRANSCODING") {
        config.audio_transcoding = AudioTranscoding::parse(&raw).ok_or_else(|| {
            format!("Invalid AUDIO_TRANSCODING value '{raw}': expected passthrough or mulaw")
        })?;
    }

    config.bridge = bridge_from_env()?;

    if let Some(base_url) = env_string("TWILIO_API_BASE_URL") {
        config.twilio_api_base_url = base_url;
    }
    if let Some(greeting) = env_string("CALL_GREETING") {
        config.call_greeting = greeting;
    }
    config.call_fallback_message = env_string("CALL_FALLBACK_MESSAGE");

    config.cors_allowed_origins = env_string("CORS_ALLOWED_ORIGINS");
    if let Some(rps) = env_parse("RATE_LIMIT_REQUESTS_PER_SECOND")? {
        config.rate_limit_requests_per_second = rps;
    }
    if let Some(burst) = env_parse("RATE_LIMIT_BURST_SIZE")? {
        config.rate_limit_burst_size = burst;
    }
    config.max_websocket_connections = env_parse("MAX_WEBSOCKET_CONNECTIONS")?;
    if let Some(per_ip) = env_parse("MAX_CONNECTIONS_PER_IP")? {
        config.max_connections_per_ip = per_ip;
    }

    Ok(config)
}

fn bridge_from_env() -> Result<BridgeConfig, Box<dyn std::error::Error>> {
    let mut bridge = BridgeConfig::default();

    if let Some(frames) = env_parse("BRIDGE_MAX_BUFFERED_FRAMES")? {
        bridge.max_buffered_frames = frames;
    }
    if let Some(timeout_ms) = env_parse("BRIDGE_SESSION_OPEN_TIMEOUT_MS")? {
        bridge.session_open_timeout_ms = timeout_ms;
    }
    if let Some(raw) = env_string("BRIDGE_MALFORMED_POLICY") {
        bridge.malformed_policy = MalformedMessagePolicy::parse(&raw).ok_or_else(|| {
            format!("Invalid BRIDGE_MALFORMED_POLICY value '{raw}': expected drop or close")
        })?;
    }
    if let Some(threshold) = env_parse("BRIDGE_MALFORMED_CLOSE_THRESHOLD")? {
        bridge.malformed_close_threshold = threshold;
    }
    if let Some(reconnects) = env_parse("BRIDGE_MAX_SESSION_RECONNECTS")? {
        bridge.max_session_reconnects = reconnects;
    }
    if let Some(clear) = env_bool("BRIDGE_CLEAR_ON_INTERRUPT")? {
        bridge.clear_on_interrupt = clear;
    }

    Ok(bridge)
}
