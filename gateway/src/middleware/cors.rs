//! CORS policy for the HTTP surface
//!
//! - unset: reflect the request origin with credentials, so a browser
//!   frontend on another origin can place calls
//! - `*`: any origin, no credentials
//! - comma-separated list: only those origins, with credentials

use http::{
    Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;

/// Methods allowed for cross-origin requests
pub const CORS_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Build the CORS layer from `CORS_ALLOWED_ORIGINS`.
pub fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(CORS_METHODS)
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    match origins.map(str::trim) {
        Some("*") => layer.allow_origin(Any).allow_credentials(false),
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            layer.allow_origin(origins).allow_credentials(true)
        }
        _ => {
            info!(
                "CORS_ALLOWED_ORIGINS not set, reflecting request origins. \
                 Set it to restrict cross-origin access."
            );
            layer
                .allow_origin(AllowOrigin::mirror_request())
                .allow_credentials(true)
        }
    }
}
