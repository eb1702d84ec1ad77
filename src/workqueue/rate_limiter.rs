// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Requeue delay calculation for the work queue.
//!
//! The delay for a failed key is the larger of two limits:
//!
//! - a per-key exponential backoff (`base * 2^failures`, capped at `max_delay`)
//! - a global token bucket shared by every key, so a burst of failures across many
//!   resources cannot hammer the DNS API
//!
//! # Retry Schedule
//!
//! With the default settings a single failing key is retried after approximately:
//!
//! 1. 5ms
//! 2. 10ms
//! 3. 20ms
//! 4. 40ms
//!
//! and the bucket only starts to matter once more than 100 requeues happen within
//! ten seconds.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::constants::{BUCKET_BURST, BUCKET_QPS, ITEM_BACKOFF_BASE_MILLIS, ITEM_BACKOFF_MAX_SECS};

/// Tunables for [`RateLimiter`].
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    /// Delay after the first failure of a key
    pub base_delay: Duration,
    /// Upper bound for the per-key delay
    pub max_delay: Duration,
    /// Token bucket refill rate (tokens per second)
    pub qps: f64,
    /// Token bucket capacity
    pub burst: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(ITEM_BACKOFF_BASE_MILLIS),
            max_delay: Duration::from_secs(ITEM_BACKOFF_MAX_SECS),
            qps: BUCKET_QPS,
            burst: BUCKET_BURST,
        }
    }
}

/// Per-key exponential backoff.
///
/// Owns the failure counter of every key; the counter is also the key's requeue count.
#[derive(Debug)]
pub struct ItemExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    failures: HashMap<String, u32>,
}

impl ItemExponentialBackoff {
    #[must_use]
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            failures: HashMap::new(),
        }
    }

    /// Record a failure for `key` and return how long it should wait.
    pub fn when(&mut self, key: &str) -> Duration {
        let exponent = self.failures.get(key).copied().unwrap_or(0);
        self.failures.insert(key.to_string(), exponent.saturating_add(1));

        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    #[must_use]
    pub fn num_requeues(&self, key: &str) -> u32 {
        self.failures.get(key).copied().unwrap_or(0)
    }

    pub fn forget(&mut self, key: &str) {
        self.failures.remove(key);
    }
}

/// Token bucket that hands out delays instead of rejecting.
///
/// Each reservation takes one token. When the bucket is empty the reservation goes into
/// debt and the returned delay is the time needed to pay it back.
#[derive(Debug)]
pub struct TokenBucket {
    qps: f64,
    burst: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    #[must_use]
    pub fn new(qps: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            qps,
            burst,
            tokens: burst,
            last_refill: Instant::now(),
        }
    }

    /// Take one token, returning how long the caller must wait for it.
    pub fn reserve(&mut self) -> Duration {
        self.reserve_at(Instant::now())
    }

    pub(crate) fn reserve_at(&mut self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * self.qps).min(self.burst);
        self.tokens -= 1.0;

        if self.tokens >= 0.0 || self.qps <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / self.qps)
        }
    }
}

/// Combined limiter used by the work queue: the larger of both delays wins.
#[derive(Debug)]
pub struct RateLimiter {
    items: ItemExponentialBackoff,
    bucket: TokenBucket,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: &RateLimiterConfig) -> Self {
        Self {
            items: ItemExponentialBackoff::new(config.base_delay, config.max_delay),
            bucket: TokenBucket::new(config.qps, config.burst),
        }
    }

    /// Record a failure for `key` and return the requeue delay.
    pub fn when(&mut self, key: &str) -> Duration {
        let item_delay = self.items.when(key);
        let bucket_delay = self.bucket.reserve();
        item_delay.max(bucket_delay)
    }

    #[must_use]
    pub fn num_requeues(&self, key: &str) -> u32 {
        self.items.num_requeues(key)
    }

    pub fn forget(&mut self, key: &str) {
        self.items.forget(key);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimiterConfig::default())
    }
}

#[cfg(test)]
#[path = "rate_limiter_tests.rs"]
mod rate_limiter_tests;
