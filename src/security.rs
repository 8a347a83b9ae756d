//! Login throttling.
//!
//! A token-bucket limiter keyed by client address, consulted by the login
//! handler before any credential work. Single-process and in-memory; a
//! multi-instance deployment needs a shared store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

pub struct RateLimitConfig {
    /// Max login attempts per minute per client
    pub attempts_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            attempts_per_minute: 5,
        }
    }
}

struct TokenBucket {
    tokens: f64,
    last_refill: SystemTime,
    capacity: u32,
    refill_rate: f64, // tokens per second
}

impl TokenBucket {
    fn new(capacity: u32) -> Self {
        Self {
            tokens: capacity as f64,
            last_refill: SystemTime::now(),
            capacity,
            refill_rate: capacity as f64 / 60.0,
        }
    }

    fn try_take_token(&mut self) -> bool {
        if let Ok(elapsed) = self.last_refill.elapsed() {
            let refilled = self.tokens + elapsed.as_secs_f64() * self.refill_rate;
            self.tokens = refilled.min(self.capacity as f64);
            self.last_refill = SystemTime::now();
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

pub struct LoginRateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl LoginRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// True if this client may attempt a login right now.
    pub fn check(&self, client: &str) -> bool {
        let mut buckets = self.buckets.lock().expect("rate limiter poisoned");
        let bucket = buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::new(self.config.attempts_per_minute));
        bucket.try_take_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_attempts_are_allowed() {
        let limiter = LoginRateLimiter::new(RateLimitConfig::default());
        assert!(limiter.check("127.0.0.1"));
    }

    #[test]
    fn burst_beyond_capacity_is_rejected() {
        let limiter = LoginRateLimiter::new(RateLimitConfig {
            attempts_per_minute: 3,
        });

        for _ in 0..3 {
            assert!(limiter.check("127.0.0.1"));
        }
        assert!(!limiter.check("127.0.0.1"));
    }

    #[test]
    fn clients_are_limited_independently() {
        let limiter = LoginRateLimiter::new(RateLimitConfig {
            attempts_per_minute: 1,
        });

        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.2"));
    }
}
