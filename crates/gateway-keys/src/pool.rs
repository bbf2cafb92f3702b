//! Round-robin key pool with failure counting and cooldowns.
//!
//! The pool hands out keys in rotation order and tracks consecutive upstream
//! failures per key. A key that fails too often sits out a cooldown and
//! re-enters rotation with a clean slate once the cooldown has elapsed.
//! Expired blocks are cleared lazily during selection, there is no background
//! sweeper task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gateway_core::{GatewayError, GatewayResult};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};

/// Key pool configuration
#[derive(Debug, Clone)]
pub struct KeyPoolConfig {
    /// Consecutive failures before a key is blocked
    pub failure_threshold: u32,
    /// How long a blocked key stays out of rotation
    pub cooldown: Duration,
}

impl Default for KeyPoolConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(300),
        }
    }
}

/// State tracked for one configured key
#[derive(Debug)]
struct KeyRecord {
    key: SecretString,
    failures: u32,
    blocked_until: Option<Instant>,
}

impl KeyRecord {
    fn new(key: SecretString) -> Self {
        Self {
            key,
            failures: 0,
            blocked_until: None,
        }
    }

    fn is_blocked(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }
}

#[derive(Debug)]
struct PoolInner {
    records: Vec<KeyRecord>,
    cursor: usize,
}

/// Shared pool of upstream API keys
#[derive(Debug)]
pub struct KeyPool {
    config: KeyPoolConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<PoolInner>,
}

impl KeyPool {
    /// Create a pool over the given keys using the system clock
    #[must_use]
    pub fn new(keys: Vec<SecretString>, config: KeyPoolConfig) -> Self {
        Self::with_clock(keys, config, Arc::new(SystemClock))
    }

    /// Create a pool with an injected clock
    #[must_use]
    pub fn with_clock(keys: Vec<SecretString>, config: KeyPoolConfig, clock: Arc<dyn Clock>) -> Self {
        let records = keys.into_iter().map(KeyRecord::new).collect();
        Self {
            config,
            clock,
            inner: Mutex::new(PoolInner { records, cursor: 0 }),
        }
    }

    /// Select the next usable key in rotation order.
    ///
    /// The cursor advances on every candidate considered, including blocked
    /// keys that get skipped. A blocked key whose cooldown has elapsed is
    /// restored (failure count reset) and becomes eligible immediately.
    ///
    /// # Errors
    /// Returns `GatewayError::NoKeysConfigured` when the pool is empty and
    /// `GatewayError::KeysExhausted` when every key is currently blocked.
    pub fn acquire(&self) -> GatewayResult<SecretString> {
        let mut inner = self.inner.lock();
        let len = inner.records.len();
        if len == 0 {
            return Err(GatewayError::NoKeysConfigured);
        }

        let now = self.clock.now();
        for _ in 0..len {
            let idx = inner.cursor;
            inner.cursor = (idx + 1) % len;

            let record = &mut inner.records[idx];
            if let Some(until) = record.blocked_until {
                if now < until {
                    continue;
                }
                record.blocked_until = None;
                record.failures = 0;
                info!(key_index = idx, "API key cooldown elapsed, restored to rotation");
            }

            debug!(key_index = idx, "API key acquired");
            return Ok(record.key.clone());
        }

        warn!(total = len, "All API keys are blocked");
        Err(GatewayError::KeysExhausted { total: len })
    }

    /// Record an upstream failure against a key.
    ///
    /// Reaching the failure threshold blocks the key for the configured
    /// cooldown. Further failures while blocked refresh the block. Reports
    /// for keys the pool does not hold are ignored.
    pub fn report_failure(&self, key: &SecretString) {
        let mut inner = self.inner.lock();
        let now = self.clock.now();

        for (idx, record) in inner.records.iter_mut().enumerate() {
            if record.key.expose_secret() != key.expose_secret() {
                continue;
            }

            record.failures += 1;
            if record.failures >= self.config.failure_threshold {
                record.blocked_until = Some(now + self.config.cooldown);
                warn!(
                    key_index = idx,
                    failures = record.failures,
                    cooldown_secs = self.config.cooldown.as_secs(),
                    "API key blocked after repeated failures"
                );
            } else {
                debug!(
                    key_index = idx,
                    failures = record.failures,
                    "API key failure recorded"
                );
            }
            return;
        }

        debug!("Failure reported for a key the pool does not hold, ignoring");
    }

    /// Record an upstream success against a key.
    ///
    /// Decrements the failure count, never below zero. An active block is
    /// left in place, only cooldown expiry lifts it.
    pub fn report_success(&self, key: &SecretString) {
        let mut inner = self.inner.lock();

        for (idx, record) in inner.records.iter_mut().enumerate() {
            if record.key.expose_secret() != key.expose_secret() {
                continue;
            }

            if record.failures > 0 {
                record.failures -= 1;
                debug!(
                    key_index = idx,
                    failures = record.failures,
                    "API key failure count decayed"
                );
            }
            return;
        }
    }

    /// Aggregate pool counters
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock();
        let now = self.clock.now();
        let blocked = inner.records.iter().filter(|r| r.is_blocked(now)).count();
        let total = inner.records.len();

        PoolStats {
            total,
            available: total - blocked,
            blocked,
        }
    }

    /// Per-key failure tracking, in configuration order
    #[must_use]
    pub fn health(&self) -> Vec<KeyHealth> {
        let inner = self.inner.lock();
        let now = self.clock.now();
        inner
            .records
            .iter()
            .map(|record| KeyHealth {
                failures: record.failures,
                blocked: record.is_blocked(now),
            })
            .collect()
    }

    /// Number of configured keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// Whether the pool holds no keys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Aggregate pool counters, reported by the readiness probe
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PoolStats {
    /// Keys configured
    pub total: usize,
    /// Keys currently eligible for selection
    pub available: usize,
    /// Keys sitting out a cooldown
    pub blocked: usize,
}

/// Per-key view of failure tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyHealth {
    /// Consecutive failure count
    pub failures: u32,
    /// Whether the key is currently blocked
    pub blocked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn keys(names: &[&str]) -> Vec<SecretString> {
        names
            .iter()
            .map(|name| SecretString::new((*name).to_string()))
            .collect()
    }

    fn pool_with_clock(names: &[&str], config: KeyPoolConfig) -> (KeyPool, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let pool = KeyPool::with_clock(keys(names), config, clock.clone());
        (pool, clock)
    }

    #[test]
    fn test_empty_pool_errors_immediately() {
        let pool = KeyPool::new(Vec::new(), KeyPoolConfig::default());
        assert!(matches!(pool.acquire(), Err(GatewayError::NoKeysConfigured)));
    }

    #[test]
    fn test_round_robin_rotation() {
        let pool = KeyPool::new(keys(&["a", "b", "c"]), KeyPoolConfig::default());

        let picks: Vec<String> = (0..4)
            .map(|_| pool.acquire().unwrap().expose_secret().clone())
            .collect();
        assert_eq!(picks, ["a", "b", "c", "a"]);
    }

    #[test]
    fn test_blocked_key_is_skipped() {
        let pool = KeyPool::new(keys(&["a", "b"]), KeyPoolConfig::default());
        let a = SecretString::new("a".to_string());
        for _ in 0..3 {
            pool.report_failure(&a);
        }

        assert_eq!(pool.acquire().unwrap().expose_secret(), "b");
        assert_eq!(pool.acquire().unwrap().expose_secret(), "b");
    }

    #[test]
    fn test_three_failures_exhaust_a_single_key() {
        let pool = KeyPool::new(keys(&["only"]), KeyPoolConfig::default());
        let key = pool.acquire().unwrap();

        pool.report_failure(&key);
        pool.report_failure(&key);
        assert!(pool.acquire().is_ok());

        pool.report_failure(&key);
        assert!(matches!(
            pool.acquire(),
            Err(GatewayError::KeysExhausted { total: 1 })
        ));
    }

    #[test]
    fn test_block_expires_and_failures_reset() {
        let (pool, clock) = pool_with_clock(&["only"], KeyPoolConfig::default());
        let key = pool.acquire().unwrap();

        for _ in 0..3 {
            pool.report_failure(&key);
        }
        assert!(pool.acquire().is_err());

        clock.advance(Duration::from_secs(301));
        assert!(pool.acquire().is_ok());
        assert_eq!(
            pool.health()[0],
            KeyHealth {
                failures: 0,
                blocked: false
            }
        );

        // A restored key takes the full threshold to block again
        pool.report_failure(&key);
        pool.report_failure(&key);
        assert!(pool.acquire().is_ok());
        pool.report_failure(&key);
        assert!(pool.acquire().is_err());
    }

    #[test]
    fn test_repeat_failures_refresh_the_block() {
        let (pool, clock) = pool_with_clock(&["only"], KeyPoolConfig::default());
        let key = pool.acquire().unwrap();

        for _ in 0..3 {
            pool.report_failure(&key);
        }

        clock.advance(Duration::from_secs(200));
        pool.report_failure(&key);

        // The original block would have expired by now, the refreshed one not
        clock.advance(Duration::from_secs(150));
        assert!(pool.acquire().is_err());

        clock.advance(Duration::from_secs(151));
        assert!(pool.acquire().is_ok());
    }

    #[test]
    fn test_success_decays_failures() {
        let pool = KeyPool::new(keys(&["only"]), KeyPoolConfig::default());
        let key = pool.acquire().unwrap();

        pool.report_failure(&key);
        pool.report_failure(&key);
        assert_eq!(pool.health()[0].failures, 2);

        pool.report_success(&key);
        assert_eq!(pool.health()[0].failures, 1);

        pool.report_success(&key);
        pool.report_success(&key);
        assert_eq!(pool.health()[0].failures, 0);
    }

    #[test]
    fn test_success_never_lifts_an_active_block() {
        let pool = KeyPool::new(keys(&["only"]), KeyPoolConfig::default());
        let key = pool.acquire().unwrap();

        for _ in 0..3 {
            pool.report_failure(&key);
        }
        pool.report_success(&key);

        assert!(pool.health()[0].blocked);
        assert!(matches!(
            pool.acquire(),
            Err(GatewayError::KeysExhausted { .. })
        ));
    }

    #[test]
    fn test_unknown_key_reports_are_ignored() {
        let pool = KeyPool::new(keys(&["a"]), KeyPoolConfig::default());
        let stranger = SecretString::new("stranger".to_string());

        pool.report_failure(&stranger);
        pool.report_success(&stranger);
        assert_eq!(
            pool.health()[0],
            KeyHealth {
                failures: 0,
                blocked: false
            }
        );
    }

    #[test]
    fn test_stats_counts_blocked_keys() {
        let pool = KeyPool::new(keys(&["a", "b", "c"]), KeyPoolConfig::default());
        let b = SecretString::new("b".to_string());
        for _ in 0..3 {
            pool.report_failure(&b);
        }

        let stats = pool.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.available, 2);
        assert_eq!(stats.blocked, 1);
    }

    #[test]
    fn test_custom_threshold_and_cooldown() {
        let config = KeyPoolConfig {
            failure_threshold: 1,
            cooldown: Duration::from_secs(10),
        };
        let (pool, clock) = pool_with_clock(&["only"], config);
        let key = pool.acquire().unwrap();

        pool.report_failure(&key);
        assert!(pool.acquire().is_err());

        clock.advance(Duration::from_secs(11));
        assert!(pool.acquire().is_ok());
    }
}
