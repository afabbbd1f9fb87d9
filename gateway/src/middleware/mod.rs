pub mod connection_limit;
pub mod cors;

// Re-export middleware functions
pub use connection_limit::{ClientIp, ConnectionGuard, connection_limit_middleware};
pub use cors::{CORS_METHODS, cors_layer};
