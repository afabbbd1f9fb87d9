//! Connection limits for media stream WebSockets
//!
//! Every call holds one WebSocket for its whole duration, so concurrent calls
//! are bounded by:
//! - a global maximum of media stream connections
//! - a per-IP maximum
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use salesvoice_gateway::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/media-stream", get(media_stream_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::state::{AppState, ConnectionLimitError};

/// Client IP of an admitted WebSocket upgrade, carried to the handler so the
/// slot can be released when the call ends.
#[derive(Clone, Debug)]
pub struct ClientIp(pub IpAddr);

/// Holds a reserved connection slot and releases it on drop.
///
/// Created by the handler from the [`ClientIp`] extension so that the slot is
/// returned however the socket task ends, including a failed upgrade.
pub struct ConnectionGuard {
    state: Arc<AppState>,
    ip: IpAddr,
}

impl ConnectionGuard {
    pub fn new(state: Arc<AppState>, ip: IpAddr) -> Self {
        Self { state, ip }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.state.release_connection(self.ip);
        tracing::debug!(
            ip = %self.ip,
            active = self.state.ws_connection_count(),
            "Released media stream connection slot"
        );
    }
}

fn is_websocket_upgrade(request: &Request<Body>) -> bool {
    request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

/// Middleware that enforces connection limits for WebSocket upgrades.
///
/// Returns 503 when the global limit is reached and 429 when the per-IP
/// limit is reached. Admitted upgrades get a [`ClientIp`] extension; the
/// handler owns releasing the slot. Plain HTTP requests pass through.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !is_websocket_upgrade(&request) {
        return next.run(request).await;
    }

    let client_ip = addr.ip();

    match state.try_acquire_connection(client_ip) {
        Ok(()) => {
            request.extensions_mut().insert(ClientIp(client_ip));
            next.run(request).await
        }
        Err(ConnectionLimitError::GlobalLimitReached) => {
            tracing::warn!(
                ip = %client_ip,
                active = state.ws_connection_count(),
                "Rejecting media stream: global limit reached"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            )
                .into_response()
        }
        Err(ConnectionLimitError::PerIpLimitReached) => {
            tracing::warn!(
                ip = %client_ip,
                "Rejecting media stream: per-IP limit reached"
            );
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many connections from your IP address.",
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use std::net::Ipv4Addr;

    fn limited_config(global: Option<usize>, per_ip: u32) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.max_websocket_connections = global;
        config.max_connections_per_ip = per_ip;
        config
    }

    #[test]
    fn test_websocket_upgrade_detection() {
        let upgrade = Request::builder()
            .uri("/media-stream")
            .header("upgrade", "WebSocket")
            .body(Body::empty())
            .unwrap();
        assert!(is_websocket_upgrade(&upgrade));

        let plain = Request::builder()
            .uri("/media-stream")
            .body(Body::empty())
            .unwrap();
        assert!(!is_websocket_upgrade(&plain));
    }

    #[tokio::test]
    async fn test_per_ip_limit() {
        let state = AppState::new(limited_config(Some(10), 3)).await;
        let ip: IpAddr = Ipv4Addr::new(192, 168, 1, 100).into();

        assert_eq!(state.ws_connection_count(), 0);
        assert_eq!(state.ip_connection_count(&ip), 0);

        for expected in 1..=3 {
            assert!(state.try_acquire_connection(ip).is_ok());
            assert_eq!(state.ip_connection_count(&ip), expected);
        }

        assert_eq!(
            state.try_acquire_connection(ip),
            Err(ConnectionLimitError::PerIpLimitReached)
        );
        // The refused attempt must not leak a global slot
        assert_eq!(state.ws_connection_count(), 3);

        state.release_connection(ip);
        assert_eq!(state.ws_connection_count(), 2);
        assert!(state.try_acquire_connection(ip).is_ok());
    }

    #[tokio::test]
    async fn test_global_limit() {
        let state = AppState::new(limited_config(Some(5), 10)).await;

        let ips: Vec<IpAddr> = (1..=6)
            .map(|i| Ipv4Addr::new(10, 0, 0, i).into())
            .collect();

        for ip in &ips[0..5] {
            assert!(state.try_acquire_connection(*ip).is_ok());
        }
        assert_eq!(state.ws_connection_count(), 5);

        assert_eq!(
            state.try_acquire_connection(ips[5]),
            Err(ConnectionLimitError::GlobalLimitReached)
        );
        assert_eq!(state.ip_connection_count(&ips[5]), 0);

        state.release_connection(ips[0]);
        assert!(state.try_acquire_connection(ips[5]).is_ok());
    }

    #[tokio::test]
    async fn test_guard_releases_on_drop() {
        let state = AppState::new(limited_config(None, 2)).await;
        let ip: IpAddr = Ipv4Addr::new(172, 16, 0, 1).into();

        state.try_acquire_connection(ip).unwrap();
        let guard = ConnectionGuard::new(state.clone(), ip);
        assert_eq!(state.ws_connection_count(), 1);

        drop(guard);
        assert_eq!(state.ws_connection_count(), 0);
        assert_eq!(state.ip_connection_count(&ip), 0);

        // Releasing again never underflows
        state.release_connection(ip);
        assert_eq!(state.ws_connection_count(), 0);
    }
}
