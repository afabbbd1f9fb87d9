//! Minimal Twilio REST client for placing outbound calls.

use std::time::Duration;

use thiserror::Error;

/// Public Twilio REST API base URL.
pub const TWILIO_API_BASE_URL: &str = "https://api.twilio.com";

/// Errors from the call creation request.
#[derive(Debug, Error)]
pub enum CallError {
    /// The request never produced a response
    #[error("Twilio request failed: {0}")]
    Request(String),

    /// Twilio answered with a non-success status
    #[error("Twilio returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Twilio answered 2xx with a body that is not JSON
    #[error("Invalid Twilio response: {0}")]
    InvalidResponse(String),

    /// Account SID would not form a valid resource path
    #[error("Invalid account SID")]
    InvalidAccountSid,
}

/// Parameters of one outbound call.
#[derive(Debug, Clone)]
pub struct CallRequest<'a> {
    pub account_sid: &'a str,
    pub auth_token: &'a str,
    pub to: &'a str,
    pub from: &'a str,
    /// URL Twilio fetches call-control instructions from once the call connects
    pub twiml_url: &'a str,
}

/// Twilio REST client.
#[derive(Debug, Clone)]
pub struct TwilioRestClient {
    http: reqwest::Client,
    base_url: String,
}

impl TwilioRestClient {
    /// Build a client with its own connection pool.
    pub fn new(base_url: impl Into<String>) -> Result<Self, CallError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| CallError::Request(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(http, base_url))
    }

    /// Build a client around a shared `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn calls_url(&self, account_sid: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.base_url, account_sid
        )
    }

    /// Place an outbound call and return Twilio's JSON response verbatim.
    ///
    /// No retry: a failed attempt is reported to the caller as is.
    pub async fn create_call(
        &self,
        request: &CallRequest<'_>,
    ) -> Result<serde_json::Value, CallError> {
        if request.account_sid.is_empty()
            || !request
                .account_sid
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        {
            return Err(CallError::InvalidAccountSid);
        }

        let response = self
            .http
            .post(self.calls_url(request.account_sid))
            .basic_auth(request.account_sid, Some(request.auth_token))
            .form(&[
                ("Url", request.twiml_url),
                ("To", request.to),
                ("From", request.from),
            ])
            .send()
            .await
            .map_err(|e| CallError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CallError::Upstream { status, body });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| CallError::InvalidResponse(e.to_string()))
    }
}
