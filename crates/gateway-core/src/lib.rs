//! # Gateway Core
//!
//! Shared types and error handling for the LLM Edge Gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - The error taxonomy and its HTTP/WebSocket boundary mappings
//! - Relay request and response types
//! - Realtime frame types and the bridge connection states

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod realtime;
pub mod relay;

// Re-export commonly used types
pub use error::{GatewayError, GatewayResult};
pub use realtime::{BridgeState, ClientFrame, ServerFrame, SetupFrame};
pub use relay::{GenerateResponse, RelayMode, RelayRequest};
