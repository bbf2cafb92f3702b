//! # Gateway Keys
//!
//! API key pooling for the LLM Edge Gateway:
//! - Round-robin rotation across the configured keys
//! - Consecutive-failure tracking with temporary blocks
//! - Lazy cooldown recovery at selection time
//! - Injectable clock for deterministic tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod pool;

// Re-export main types
pub use clock::{Clock, ManualClock, SystemClock};
pub use pool::{KeyHealth, KeyPool, KeyPoolConfig, PoolStats};
