use axum::{
    Router,
    routing::{any, get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, calls};
use crate::state::AppState;
use std::sync::Arc;

/// Create the HTTP router: health check and Twilio call control
///
/// `/incoming-call` accepts any method since Twilio webhooks may be
/// configured as GET or POST.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/outbound-call", post(calls::outbound_call))
        .route("/incoming-call", any(calls::incoming_call))
        .layer(TraceLayer::new_for_http())
}
