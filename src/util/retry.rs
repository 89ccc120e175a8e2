//! Bounded retry for engine calls, with exponential backoff and jitter.
//!
//! A rate-limited engine may say how long to wait (`Retry-After`); that hint
//! wins over the backoff curve whenever it asks for longer.

use std::future::Future;
use std::time::Duration;

use crate::error::VoxError;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Final result of a retried operation and the number of attempts it used.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, VoxError>,
    /// Zero only when the policy allows no attempts at all.
    pub attempts: u32,
}

impl RetryPolicy {
    /// Policy with the default backoff curve and a custom attempt limit.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Execute an async operation with retry, discarding the attempt count.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, VoxError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, VoxError>>,
    {
        self.run(|_| operation()).await.result
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error or
    /// `max_attempts` is spent. The closure receives the 1-based attempt number.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, VoxError>>,
    {
        let mut backoff = self.initial_backoff;

        for attempt in 1..=self.max_attempts {
            let err = match operation(attempt).await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(err) => err,
            };
            if !err.is_retryable() || attempt >= self.max_attempts {
                return RetryOutcome {
                    result: Err(err),
                    attempts: attempt,
                };
            }

            let delay = self.delay_after(&err, backoff, rand_factor());
            tracing::warn!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "engine call failed; retrying"
            );
            tokio::time::sleep(delay).await;

            backoff = Duration::from_secs_f64(
                (backoff.as_secs_f64() * self.multiplier).min(self.max_backoff.as_secs_f64()),
            );
        }

        RetryOutcome {
            result: Err(VoxError::Configuration(
                "retry policy allows zero attempts".to_string(),
            )),
            attempts: 0,
        }
    }

    /// Backoff with 75%–125% jitter, stretched to a rate limit's retry-after.
    fn delay_after(&self, err: &VoxError, backoff: Duration, jitter: f64) -> Duration {
        let jittered = Duration::from_secs_f64(backoff.as_secs_f64() * (0.75 + jitter * 0.5));
        match err {
            VoxError::RateLimited {
                retry_after_ms: Some(ms),
            } => jittered.max(Duration::from_millis(*ms)),
            _ => jittered,
        }
    }
}

/// Pseudo-random factor in [0, 1) from the clock and thread id.
fn rand_factor() -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);

    (hasher.finish() % 10_000) as f64 / 10_000.0
}
