//! # Gateway Server
//!
//! HTTP and WebSocket surface for the LLM Edge Gateway.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Unary and streaming relay of generation requests
//! - Realtime WebSocket bridge to the upstream live API
//! - Health, readiness and liveness probes
//! - Graceful shutdown handling

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bridge;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

// Re-export main types
pub use error::ApiError;
pub use routes::create_router;
pub use server::{Server, ServerConfig};
pub use state::{AppState, AppStateBuilder};
