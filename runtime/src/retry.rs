//! Exponential backoff for store writes that may fail transiently.
//!
//! The ticket issuer retries the ticket insert, and the compensating release
//! if the insert never lands. Both are idempotent: the insert carries the same
//! ticket id on every attempt, and a release is only attempted once its
//! reservation is known to be orphaned.
//!
//! Only [`Transient`] failures are retried. An integrity violation will fail
//! the same way every time, so it is returned immediately.
//!
//! ```rust
//! use boxoffice_core::error::StoreError;
//! use boxoffice_runtime::retry::{RetryPolicy, retry_with_backoff};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), StoreError> {
//! let policy = RetryPolicy::builder()
//!     .max_retries(5)
//!     .initial_delay(Duration::from_millis(20))
//!     .max_delay(Duration::from_secs(1))
//!     .build();
//!
//! let sold = retry_with_backoff(&policy, "count_sold", || async { Ok::<u32, StoreError>(7) }).await?;
//! assert_eq!(sold, 7);
//! # Ok(())
//! # }
//! ```

use crate::metrics::RetryMetrics;
use boxoffice_core::error::StoreError;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// A failure that knows whether trying again could help.
pub trait Transient: Display {
    /// `true` if a later attempt may succeed.
    fn is_transient(&self) -> bool;
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Database(_) => true,
            Self::Integrity(_) => false,
        }
    }
}

/// How many times to retry and how long to wait in between.
///
/// The default (3 retries, 50ms doubling up to 2s) keeps a purchase that hits
/// a flapping database under a few seconds end to end.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: usize,
    /// Wait before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single wait
    pub max_delay: Duration,
    /// Growth factor between consecutive waits
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Start from the default policy.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder(Self::default())
    }

    /// Single attempt, no waiting.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Wait before retry number `retry` (0-based):
    /// `initial_delay * multiplier^retry`, never more than `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, retry: usize) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let seconds = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(seconds).map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Builder for [`RetryPolicy`]; unset fields keep their defaults.
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder(RetryPolicy);

impl RetryPolicyBuilder {
    /// Attempts after the first one.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: usize) -> Self {
        self.0.max_retries = max_retries;
        self
    }

    /// Wait before the first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.0.initial_delay = delay;
        self
    }

    /// Cap on any single wait.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.0.max_delay = delay;
        self
    }

    /// Growth factor between waits.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.0.multiplier = multiplier;
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        self.0
    }
}

/// Run `operation` until it succeeds, fails permanently, or `policy` runs out
/// of retries.
///
/// `operation_name` labels log lines and the `boxoffice_retries_total` /
/// `boxoffice_retries_exhausted_total` counters.
///
/// # Errors
///
/// The first non-transient error, or the error of the last attempt.
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &'static str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient,
{
    let mut retries = 0;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::info!(operation = operation_name, retries, "Recovered after retrying");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !err.is_transient() {
            tracing::warn!(operation = operation_name, error = %err, "Permanent failure, not retrying");
            return Err(err);
        }
        if retries >= policy.max_retries {
            RetryMetrics::record_exhausted(operation_name);
            tracing::error!(operation = operation_name, retries, error = %err, "Giving up");
            return Err(err);
        }

        let delay = policy.delay_for_attempt(retries);
        RetryMetrics::record_retry(operation_name);
        tracing::warn!(
            operation = operation_name,
            retry = retries + 1,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "Transient failure, backing off"
        );
        tokio::time::sleep(delay).await;
        retries += 1;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quick(max_retries: usize) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(max_retries)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(2))
            .build()
    }

    fn down() -> StoreError {
        StoreError::Unavailable("connection refused".to_string())
    }

    #[test]
    fn test_delay_doubles_until_capped() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(500))
            .build();

        let delays: Vec<_> = (0..5).map(|retry| policy.delay_for_attempt(retry)).collect();
        assert_eq!(
            delays,
            [100, 200, 400, 500, 500].map(Duration::from_millis).to_vec()
        );
        assert_eq!(policy.delay_for_attempt(usize::MAX), Duration::from_millis(500));
    }

    #[test]
    fn test_integrity_errors_are_permanent() {
        assert!(down().is_transient());
        assert!(StoreError::Database("deadlock detected".to_string()).is_transient());
        assert!(!StoreError::Integrity("orphaned ticket".to_string()).is_transient());
    }

    #[tokio::test]
    async fn test_recovers_from_transient_failures() {
        let calls = &AtomicUsize::new(0);

        let result = retry_with_backoff(&quick(3), "insert_ticket", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(down())
            } else {
                Ok("written")
            }
        })
        .await;

        assert_eq!(result, Ok("written"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_with_last_error() {
        let calls = &AtomicUsize::new(0);

        let result = retry_with_backoff(&quick(2), "insert_ticket", move || async move {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(StoreError::Unavailable(format!("attempt {call}")))
        })
        .await;

        assert_eq!(result, Err(StoreError::Unavailable("attempt 2".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let calls = &AtomicUsize::new(0);

        let result = retry_with_backoff(&quick(5), "insert_ticket", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(StoreError::Integrity("event missing".to_string()))
        })
        .await;

        assert!(matches!(result, Err(StoreError::Integrity(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_retry_tries_once() {
        let calls = &AtomicUsize::new(0);

        let result = retry_with_backoff(&RetryPolicy::no_retry(), "release_reservation", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(down())
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
