//! Shared application state.
//!
//! Everything here is either immutable after startup (config, session factory,
//! HTTP client) or a connection counter. No per-call state lives here.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use thiserror::Error;
use tracing::warn;

use crate::config::ServerConfig;
use crate::core::live::{DefaultLiveSessionFactory, LiveSessionFactory};
use crate::core::telephony::TwilioRestClient;

/// Why a media stream connection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionLimitError {
    #[error("global connection limit reached")]
    GlobalLimitReached,
    #[error("per-IP connection limit reached")]
    PerIpLimitReached,
}

/// Application state shared by all handlers.
pub struct AppState {
    pub config: ServerConfig,
    /// Creates one live session per bridge
    pub live_factory: Arc<dyn LiveSessionFactory>,
    /// Outbound call client over a shared connection pool
    pub twilio: TwilioRestClient,
    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, usize>,
}

impl AppState {
    /// Build the state with the default live session factory.
    pub async fn new(config: ServerConfig) -> Arc<Self> {
        Self::with_live_factory(config, Arc::new(DefaultLiveSessionFactory)).await
    }

    /// Build the state with a specific live session factory.
    pub async fn with_live_factory(
        config: ServerConfig,
        live_factory: Arc<dyn LiveSessionFactory>,
    ) -> Arc<Self> {
        let twilio = TwilioRestClient::new(config.twilio_api_base_url.clone()).unwrap_or_else(|e| {
            warn!("Failed to build tuned HTTP client, using defaults: {}", e);
            TwilioRestClient::with_client(
                reqwest::Client::new(),
                config.twilio_api_base_url.clone(),
            )
        });

        Arc::new(Self {
            config,
            live_factory,
            twilio,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    /// Reserve a media stream slot for `ip`.
    ///
    /// The global counter is reserved first and rolled back if the per-IP
    /// limit refuses the connection.
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        if let Some(max) = self.config.max_websocket_connections {
            self.ws_connections
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    (current < max).then_some(current + 1)
                })
                .map_err(|_| ConnectionLimitError::GlobalLimitReached)?;
        } else {
            self.ws_connections.fetch_add(1, Ordering::AcqRel);
        }

        let per_ip_limit = self.config.max_connections_per_ip as usize;
        let mut entry = self.ip_connections.entry(ip).or_insert(0);
        if *entry >= per_ip_limit {
            drop(entry);
            self.ws_connections.fetch_sub(1, Ordering::AcqRel);
            return Err(ConnectionLimitError::PerIpLimitReached);
        }
        *entry += 1;

        Ok(())
    }

    /// Release a slot reserved by [`try_acquire_connection`](Self::try_acquire_connection).
    pub fn release_connection(&self, ip: IpAddr) {
        let _ = self
            .ws_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });

        self.ip_connections.remove_if_mut(&ip, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::Acquire)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> usize {
        self.ip_connections.get(ip).map(|count| *count).unwrap_or(0)
    }
}
