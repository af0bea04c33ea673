//! Exponential backoff with jitter for the `TRANSIENT` error class (§7).
//! Mirrors the shape of the teacher's `sdk::retry::RetryPolicy`, generalized
//! from its SDK-specific error type to [`crate::domain::CoreError`].

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::CoreError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Runs `operation` until it succeeds, exhausts attempts, or returns a
    /// non-retryable error. Non-retryable errors (per
    /// [`CoreError::is_retryable`]) are returned immediately on the first
    /// attempt, never retried.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut attempts = 0usize;
        let mut last_error = None;

        while attempts < self.max_attempts {
            attempts += 1;
            match operation().await {
                Ok(result) => {
                    if attempts > 1 {
                        debug!(attempts, "adapter operation succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    warn!(attempt = attempts, max_attempts = self.max_attempts, error = %err, "retryable adapter error");
                    last_error = Some(err);
                    if attempts < self.max_attempts {
                        sleep(self.backoff_for(attempts)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CoreError::internal("retry loop exited with no attempts")))
    }

    fn backoff_for(&self, attempt: usize) -> Duration {
        let base = self.initial_backoff.as_secs_f64() * self.multiplier.powi((attempt - 1) as i32);
        let capped = Duration::from_secs_f64(base.min(self.max_backoff.as_secs_f64()));
        if self.jitter {
            add_jitter(capped)
        } else {
            capped
        }
    }
}

fn add_jitter(duration: Duration) -> Duration {
    let jitter: f64 = rand::thread_rng().gen_range(0.0..=0.3);
    Duration::from_secs_f64(duration.as_secs_f64() * (1.0 - jitter))
}
