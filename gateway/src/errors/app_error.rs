use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::core::telephony::CallError;

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// The request itself is invalid
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Twilio rejected the outbound call
    #[error("Call initiation failed ({status}): {message}")]
    CallInitiation { status: u16, message: String },

    /// Twilio could not be reached or answered with garbage
    #[error("Upstream error: {0}")]
    Upstream(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::CallInitiation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<CallError> for AppError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Upstream { status, body } => AppError::CallInitiation {
                status,
                message: body,
            },
            CallError::Request(msg) => AppError::Upstream(msg),
            CallError::InvalidResponse(msg) => AppError::Upstream(msg),
            CallError::InvalidAccountSid => {
                AppError::BadRequest("accountSid must be alphanumeric".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            AppError::CallInitiation { status, message } => json!({
                "error": message,
                "upstream_status": status,
            }),
            AppError::BadRequest(msg) | AppError::Upstream(msg) => {
                json!({ "error": msg })
            }
        };

        (status, Json(body)).into_response()
    }
}
