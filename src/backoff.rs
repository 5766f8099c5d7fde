//! # Constant Backoff
//!
//! Polls an operation on a fixed interval until it succeeds or the attempt
//! budget runs out.
//!
//! The wait being covered is an external controller's reconciliation delay,
//! which is roughly constant, so the interval does not grow between attempts.
//! Attempts are strictly sequential.
//!
//! ## Usage
//!
//! ```rust
//! use external_secrets_check::backoff::{poll_until, ConstantBackoff};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let backoff = ConstantBackoff::new(Duration::from_secs(3), 6);
//! let result: Result<u32, _> = poll_until(&backoff, "lookup", || async {
//!     Ok::<_, String>(42)
//! })
//! .await;
//! assert_eq!(result.unwrap(), 42);
//! # }
//! ```

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Constant backoff with a bounded number of attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantBackoff {
    interval: Duration,
    max_attempts: u32,
}

impl ConstantBackoff {
    /// Create a backoff that makes at most `max_attempts` calls spaced by `interval`
    ///
    /// A budget of zero is treated as one attempt.
    #[must_use]
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Every attempt failed; carries the error from the final one
#[derive(Debug, Error)]
#[error("gave up after {attempts} attempts: {last_error}")]
pub struct RetriesExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Call `operation` until it returns `Ok` or `backoff.max_attempts()` calls have failed
pub async fn poll_until<F, Fut, T, E>(
    backoff: &ConstantBackoff,
    operation_name: &str,
    mut operation: F,
) -> Result<T, RetriesExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        info!(operation = %operation_name, attempt, "Polling");

        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= backoff.max_attempts => {
                warn!(
                    operation = %operation_name,
                    attempt,
                    error = %e,
                    "Giving up, attempt budget exhausted"
                );
                return Err(RetriesExhausted {
                    attempts: attempt,
                    last_error: e,
                });
            }
            Err(e) => {
                info!(
                    operation = %operation_name,
                    attempt,
                    error = %e,
                    retry_in_secs = backoff.interval.as_secs_f64(),
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(backoff.interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_first_time_without_sleeping() {
        let backoff = ConstantBackoff::new(Duration::from_secs(3), 6);
        let start = Instant::now();

        let result: Result<&str, RetriesExhausted<String>> =
            poll_until(&backoff, "op", || async { Ok("found") }).await;

        assert_eq!(result.unwrap(), "found");
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_k_failures_with_constant_spacing() {
        let backoff = ConstantBackoff::new(Duration::from_secs(3), 6);
        let calls: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
        let k = 3;

        let recorded = Arc::clone(&calls);
        let result = poll_until(&backoff, "op", move || {
            let recorded = Arc::clone(&recorded);
            async move {
                let mut calls = recorded.lock().unwrap();
                calls.push(Instant::now());
                if calls.len() <= k {
                    Err(format!("not yet ({})", calls.len()))
                } else {
                    Ok(calls.len())
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), k + 1);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), k + 1);
        for pair in calls.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(3));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_stops_at_budget_and_keeps_last_error() {
        let backoff = ConstantBackoff::new(Duration::from_secs(3), 5);
        let count = Arc::new(Mutex::new(0u32));
        let start = Instant::now();

        let counter = Arc::clone(&count);
        let result: Result<(), _> = poll_until(&backoff, "op", move || {
            let counter = Arc::clone(&counter);
            async move {
                let mut n = counter.lock().unwrap();
                *n += 1;
                Err(format!("failure {}", *n))
            }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 5);
        assert_eq!(err.last_error, "failure 5");
        assert_eq!(*count.lock().unwrap(), 5);
        // No sleep after the final attempt
        assert_eq!(start.elapsed(), Duration::from_secs(12));
    }

    #[test]
    fn test_zero_budget_still_makes_one_attempt() {
        let backoff = ConstantBackoff::new(Duration::from_secs(1), 0);
        assert_eq!(backoff.max_attempts(), 1);
    }
}
