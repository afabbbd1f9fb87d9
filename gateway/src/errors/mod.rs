//! Error types for the HTTP surface.
//!
//! Lower layers carry their own `thiserror` enums (`LiveError`,
//! `TelephonyError`, `CallError`); `AppError` is what handlers return.

pub mod app_error;

pub use app_error::{AppError, AppResult};
