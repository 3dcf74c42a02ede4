use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Errors that can tell a temporary condition from a permanent one.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for crate::llm::LlmError {
    fn is_transient(&self) -> bool {
        self.is_rate_limited()
    }
}

/// Cooldown schedule between attempts; never decreases with the attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same cooldown after every failed attempt.
    Fixed(u64),
    /// `base × attempt`: 15s, 30s, ...
    Linear(u64),
}

impl Backoff {
    /// Cooldown after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(secs) => Duration::from_secs(secs),
            Backoff::Linear(secs) => Duration::from_secs(secs.saturating_mul(u64::from(attempt.max(1)))),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fixed(10)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("permanent failure: {0}")]
    Permanent(E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Backoff::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `f` until it succeeds, fails permanently, or runs out of attempts.
    ///
    /// Only transient errors are retried; anything else returns immediately.
    /// There is no cooldown after the final attempt.
    pub async fn retry<F, Fut, T, E>(&self, operation_name: &str, mut f: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + fmt::Display,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match f().await {
                Ok(result) => {
                    if attempt > 1 {
                        info!(
                            operation = operation_name,
                            attempts = attempt,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(result);
                }
                Err(e) if !e.is_transient() => {
                    return Err(RetryError::Permanent(e));
                }
                Err(e) => {
                    if attempt >= self.max_attempts {
                        warn!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %e,
                            "Operation failed after max retries"
                        );
                        return Err(RetryError::Exhausted { attempts: attempt, last: e });
                    }

                    let backoff = self.backoff.delay(attempt);
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Rate limited, cooling down before retry"
                    );

                    sleep(backoff).await;
                }
            }
        }
    }
}
