//! Mock provider servers for integration tests
//!
//! - `gemini_mock`: a Gemini Live `BidiGenerateContent` WebSocket server

// Not every test binary uses every helper
#![allow(dead_code)]

pub mod gemini_mock;

pub use gemini_mock::{MockGeminiBehavior, MockGeminiServer};
