//! Twilio call control endpoints
//!
//! - `POST /outbound-call` places a call whose webhook points back at
//!   `/incoming-call`
//! - `/incoming-call` answers Twilio with TwiML that greets the caller and
//!   connects the call audio to `/media-stream`

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::core::telephony::{CallRequest, twiml};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;
use crate::utils::validate_phone_number;

/// Body of `POST /outbound-call`
///
/// Twilio credentials travel with each request; nothing is stored server side.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundCallRequest {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
}

fn request_host(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::HOST).and_then(|v| v.to_str().ok())
}

fn required(value: &str, field: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

/// Place an outbound call through Twilio.
///
/// Returns Twilio's call resource as is. Failures are not retried.
pub async fn outbound_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<OutboundCallRequest>,
) -> AppResult<Json<serde_json::Value>> {
    required(&request.account_sid, "accountSid")?;
    required(&request.auth_token, "authToken")?;

    let to = validate_phone_number(&request.to)
        .map_err(|e| AppError::BadRequest(format!("to: {e}")))?;
    let from = validate_phone_number(&request.from)
        .map_err(|e| AppError::BadRequest(format!("from: {e}")))?;

    let host = state
        .config
        .resolve_public_host(request_host(&headers))
        .ok_or_else(|| {
            AppError::BadRequest("Cannot determine public host for the call webhook".to_string())
        })?;
    let twiml_url = format!("https://{host}/incoming-call");

    info!(to = %to, from = %from, webhook = %twiml_url, "Placing outbound call");

    let call = state
        .twilio
        .create_call(&CallRequest {
            account_sid: request.account_sid.trim(),
            auth_token: &request.auth_token,
            to: &to,
            from: &from,
            twiml_url: &twiml_url,
        })
        .await
        .map_err(|e| {
            error!(to = %to, "Outbound call failed: {}", e);
            AppError::from(e)
        })?;

    info!(
        call_sid = call.get("sid").and_then(|v| v.as_str()).unwrap_or("unknown"),
        "Outbound call created"
    );

    Ok(Json(call))
}

/// Answer a Twilio voice webhook with stream-connect TwiML.
pub async fn incoming_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let Some(host) = state.config.resolve_public_host(request_host(&headers)) else {
        warn!("Incoming call webhook without a Host header and no PUBLIC_HOST configured");
        return AppError::BadRequest("Cannot determine host for the media stream".to_string())
            .into_response();
    };

    let stream_url = format!("wss://{host}/media-stream");
    info!(stream_url = %stream_url, "Answering incoming call");

    let body = twiml::connect_stream(
        &state.config.call_greeting,
        &stream_url,
        state.config.call_fallback_message.as_deref(),
    );

    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}
