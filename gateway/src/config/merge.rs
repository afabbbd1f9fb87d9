use std::path::PathBuf;

use super::yaml::{
    AudioYaml, BridgeYaml, GeminiYaml, SecurityYaml, ServerYaml, TwilioYaml, YamlConfig,
};
use super::{ServerConfig, TlsConfig, env};
use crate::core::audio::AudioTranscoding;
use crate::core::bridge::MalformedMessagePolicy;

/// Merge the environment (base) with optional YAML overrides.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = env::load_from_env()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        apply_server(&mut config, server)?;
    }
    if let Some(gemini) = yaml.gemini {
        apply_gemini(&mut config, gemini);
    }
    if let Some(audio) = yaml.audio {
        apply_audio(&mut config, audio)?;
    }
    if let Some(bridge) = yaml.bridge {
        apply_bridge(&mut config, bridge)?;
    }
    if let Some(twilio) = yaml.twilio {
        apply_twilio(&mut config, twilio);
    }
    if let Some(security) = yaml.security {
        apply_security(&mut config, security);
    }

    Ok(config)
}

fn apply_server(
    config: &mut ServerConfig,
    server: ServerYaml,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(host) = server.host {
        config.host = host;
    }
    if let Some(port) = server.port {
        config.port = port;
    }
    if let Some(public_host) = server.public_host {
        config.public_host = Some(public_host);
    }
    if let Some(tls) = server.tls {
        if tls.enabled == Some(false) {
            config.tls = None;
        } else {
            match (tls.cert_path, tls.key_path) {
                (Some(cert), Some(key)) => {
                    config.tls = Some(TlsConfig {
                        cert_path: PathBuf::from(cert),
                        key_path: PathBuf::from(key),
                    });
                }
                (None, None) if tls.enabled.is_none() => {}
                _ => {
                    return Err(
                        "server.tls requires both cert_path and key_path when enabled".into(),
                    );
                }
            }
        }
    }
    Ok(())
}

fn apply_gemini(config: &mut ServerConfig, gemini: GeminiYaml) {
    if let Some(api_key) = gemini.api_key {
        config.gemini_api_key = Some(api_key);
    }
    if let Some(provider) = gemini.provider {
        config.live_provider = provider;
    }
    if let Some(model) = gemini.model {
        config.gemini_model = model;
    }
    if let Some(voice) = gemini.voice {
        config.gemini_voice = voice;
    }
    if let Some(instructions) = gemini.instructions {
        config.agent_instructions = instructions;
    }
    if let Some(url) = gemini.url {
        config.gemini_live_url = Some(url);
    }
}

fn apply_audio(config: &mut ServerConfig, audio: AudioYaml) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(raw) = audio.transcoding {
        config.audio_transcoding = AudioTranscoding::parse(&raw).ok_or_else(|| {
            format!("Invalid audio.transcoding value '{raw}': expected passthrough or mulaw")
        })?;
    }
    if let Some(rate) = audio.telephony_sample_rate {
        config.telephony_sample_rate = rate;
    }
    Ok(())
}

fn apply_bridge(config: &mut ServerConfig, bridge: BridgeYaml) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(frames) = bridge.max_buffered_frames {
        config.bridge.max_buffered_frames = frames;
    }
    if let Some(timeout_ms) = bridge.session_open_timeout_ms {
        config.bridge.session_open_timeout_ms = timeout_ms;
    }
    if let Some(raw) = bridge.malformed_policy {
        config.bridge.malformed_policy = MalformedMessagePolicy::parse(&raw).ok_or_else(|| {
            format!("Invalid bridge.malformed_policy value '{raw}': expected drop or close")
        })?;
    }
    if let Some(threshold) = bridge.malformed_close_threshold {
        config.bridge.malformed_close_threshold = threshold;
    }
    if let Some(reconnects) = bridge.max_session_reconnects {
        config.bridge.max_session_reconnects = reconnects;
    }
    if let Some(clear) = bridge.clear_on_interrupt {
        config.bridge.clear_on_interrupt = clear;
    }
    Ok(())
}

fn apply_twilio(config: &mut ServerConfig, twilio: TwilioYaml) {
    if let Some(base_url) = twilio.api_base_url {
        config.twilio_api_base_url = base_url;
    }
    if let Some(greeting) = twilio.greeting {
        config.call_greeting = greeting;
    }
    if let Some(fallback) = twilio.fallback_message {
        config.call_fallback_message = Some(fallback);
    }
}

fn apply_security(config: &mut ServerConfig, security: SecurityYaml) {
    if let Some(origins) = security.cors_allowed_origins {
        config.cors_allowed_origins = Some(origins);
    }
    if let Some(rps) = security.rate_limit_requests_per_second {
        config.rate_limit_requests_per_second = rps;
    }
    if let Some(burst) = security.rate_limit_burst_size {
        config.rate_limit_burst_size = burst;
    }
    if let Some(max) = security.max_websocket_connections {
        config.max_websocket_connections = Some(max);
    }
    if let Some(per_ip) = security.max_connections_per_ip {
        config.max_connections_per_ip = per_ip;
    }
}
