//! # Gateway Telemetry
//!
//! Observability for the LLM Edge Gateway.
//!
//! This crate provides:
//! - Structured logging, plain or JSON lines
//! - `RUST_LOG`-style filtering with a configured fallback level

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;

// Re-export main types
pub use logging::{init_logging, LoggingConfig, TelemetryError};
