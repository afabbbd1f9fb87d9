use url::Url;

use super::ServerConfig;
use crate::core::live::LiveProvider;

/// Validate a merged configuration.
///
/// # Errors
/// Returns an error if:
/// - The live provider is unknown
/// - Bridge limits are zero where a positive value is required
/// - The telephony sample rate is zero
/// - The Twilio base URL or Gemini endpoint override is not a valid URL
/// - The public host contains a scheme or path
pub(super) fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_live_provider(&config.live_provider)?;
    validate_bridge(config)?;
    validate_urls(config)?;
    validate_public_host(config.public_host.as_deref())?;
    Ok(())
}

fn validate_live_provider(provider: &str) -> Result<(), Box<dyn std::error::Error>> {
    if LiveProvider::parse(provider).is_none() {
        return Err(format!("Unsupported live provider '{provider}'").into());
    }
    Ok(())
}

fn validate_bridge(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.bridge.max_buffered_frames == 0 {
        return Err("bridge max_buffered_frames must be greater than zero".into());
    }
    if config.bridge.session_open_timeout_ms == 0 {
        return Err("bridge session_open_timeout_ms must be greater than zero".into());
    }
    if config.bridge.malformed_close_threshold == 0 {
        return Err("bridge malformed_close_threshold must be greater than zero".into());
    }
    if config.telephony_sample_rate == 0 {
        return Err("telephony_sample_rate must be greater than zero".into());
    }
    Ok(())
}

fn validate_urls(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let base = Url::parse(&config.twilio_api_base_url)
        .map_err(|e| format!("Invalid Twilio API base URL '{}': {e}", config.twilio_api_base_url))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(format!(
            "Twilio API base URL must use http or https, got '{}'",
            base.scheme()
        )
        .into());
    }

    if let Some(endpoint) = &config.gemini_live_url {
        let url = Url::parse(endpoint)
            .map_err(|e| format!("Invalid Gemini Live URL '{endpoint}': {e}"))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(format!(
                "Gemini Live URL must use ws or wss, got '{}'",
                url.scheme()
            )
            .into());
        }
    }
    Ok(())
}

fn validate_public_host(public_host: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(host) = public_host
        && (host.contains("://") || host.contains('/'))
    {
        return Err(format!(
            "PUBLIC_HOST must be a bare host name (optionally with port), got '{host}'"
        )
        .into());
    }
    Ok(())
}
