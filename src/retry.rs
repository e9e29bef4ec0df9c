// src/retry.rs
//! Explicit retry policy used around external call sites. Keeps retry
//! semantics visible and testable instead of hiding them in wrappers.

use rand::Rng;
use std::time::Duration;

/// Outcome classification for one attempt, decided by the caller's
/// retryable-error predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Worth another try (timeouts, 429/5xx, malformed body).
    Transient,
    /// Will not succeed on retry (4xx, robots disallow).
    Permanent,
}

/// Capped-attempt policy with short jittered backoff between tries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Linear backoff base; attempt `n` sleeps `base * n` plus jitter.
    pub backoff_base: Duration,
    /// Upper bound on the random jitter added to each sleep.
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Policy for the rendering-fetch tier: two total attempts, short
    /// jittered backoff.
    pub fn render_fetch() -> Self {
        Self {
            max_attempts: 2,
            backoff_base: Duration::from_millis(400),
            jitter: Duration::from_millis(400),
        }
    }

    /// Single attempt, no backoff.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            backoff_base: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let jitter_ms = if self.jitter.is_zero() {
            0
        } else {
            rand::rng().random_range(0..self.jitter.as_millis() as u64)
        };
        self.backoff_base * attempt + Duration::from_millis(jitter_ms)
    }

    /// Drive `op` until it succeeds, fails permanently, or attempts run out.
    /// `classify` decides whether an error is worth retrying. Returns the
    /// last error when all attempts are exhausted.
    pub async fn run<T, E, F, Fut, C>(&self, mut op: F, classify: C) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        C: Fn(&E) -> Attempt,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt >= self.max_attempts || classify(&e) == Attempt::Permanent {
                        return Err(e);
                    }
                    tokio::time::sleep(self.backoff_for(attempt)).await;
                }
            }
        }
    }
}
