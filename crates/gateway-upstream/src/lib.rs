//! # Gateway Upstream
//!
//! Gemini upstream transports for the LLM Edge Gateway:
//! - HTTP client for unary and SSE-streamed generation
//! - WebSocket connector for bidirectional live sessions

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod gemini;
pub mod live;

// Re-export main types
pub use gemini::{GeminiClient, GeminiConfig};
pub use live::{GeminiLive, LiveConnector, LiveEvent, LiveFrame, LiveSession};
