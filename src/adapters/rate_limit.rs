//! Token-bucket rate limiting (§4.1): each adapter owns one bucket and
//! honours `retry_after` rather than tight-looping against a throttled
//! platform.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allow,
    Deny { retry_after: Duration },
}

/// Classic token bucket: `capacity` tokens, refilled at `refill_rate` per
/// second, one token consumed per call.
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_rate_per_sec: f64) -> Self {
        Self {
            capacity,
            refill_rate: refill_rate_per_sec,
            state: Mutex::new(BucketState { tokens: capacity, last_refill: Instant::now() }),
        }
    }

    pub fn try_acquire(&self) -> RateLimitDecision {
        let mut state = self.state.lock().expect("token bucket mutex poisoned");
        let elapsed = state.last_refill.elapsed().as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity);
        state.last_refill = Instant::now();

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            RateLimitDecision::Allow
        } else {
            let deficit = 1.0 - state.tokens;
            let wait_secs = deficit / self.refill_rate;
            RateLimitDecision::Deny { retry_after: Duration::from_secs_f64(wait_secs) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_capacity_then_denies() {
        let bucket = TokenBucket::new(2.0, 1.0);
        assert_eq!(bucket.try_acquire(), RateLimitDecision::Allow);
        assert_eq!(bucket.try_acquire(), RateLimitDecision::Allow);
        assert!(matches!(bucket.try_acquire(), RateLimitDecision::Deny { .. }));
    }

    #[test]
    fn denial_carries_a_positive_retry_after() {
        let bucket = TokenBucket::new(1.0, 0.5);
        bucket.try_acquire();
        match bucket.try_acquire() {
            RateLimitDecision::Deny { retry_after } => assert!(retry_after.as_secs_f64() > 0.0),
            RateLimitDecision::Allow => panic!("expected denial"),
        }
    }
}
