//! Bounded retries with a per-attempt deadline.

use std::future::Future;
use std::time::Duration;

use crate::error::PapergraphError;

/// How many times to try a model call and how long each try may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
    /// Delay before the second attempt, doubled for each one after
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            timeout,
            backoff: Duration::ZERO,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

/// The last error seen once retrying stopped.
#[derive(Debug)]
pub struct RetryFailure {
    pub attempts: u32,
    pub last_error: PapergraphError,
}

/// Run `op` until it succeeds, fails terminally, or the attempt budget runs out.
///
/// `op` receives the 1-based attempt number. A timed-out attempt counts
/// as a retryable [`PapergraphError::Timeout`].
pub async fn with_retries<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> std::result::Result<T, RetryFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = crate::Result<T>>,
{
    let mut delay = policy.backoff;
    let mut attempt = 1;

    loop {
        let error = match tokio::time::timeout(policy.timeout, op(attempt)).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => PapergraphError::Timeout(policy.timeout),
        };

        if !error.is_retryable() || attempt >= policy.max_attempts {
            return Err(RetryFailure {
                attempts: attempt,
                last_error: error,
            });
        }

        log::warn!(
            "{}: retry {}/{} after error: {}",
            label,
            attempt,
            policy.max_attempts - 1,
            error
        );

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
            delay = next_backoff(delay);
        }
        attempt += 1;
    }
}

/// Double the backoff, saturating instead of overflowing.
fn next_backoff(delay: Duration) -> Duration {
    delay.saturating_mul(2)
}
