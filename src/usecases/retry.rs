//! Bounded retry with exponential backoff and a per-attempt timeout.

use crate::domain::DomainError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// First backoff delay.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(750);
/// Growth factor between consecutive delays.
pub const DEFAULT_MULTIPLIER: f64 = 1.75;
/// Upper bound for a single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. At least 1.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Budget for a single attempt.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: DEFAULT_INITIAL_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            max_delay: DEFAULT_MAX_DELAY,
            timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            timeout,
            ..Self::default()
        }
    }

    /// Delays slept between attempts, in order. Yields `max_attempts - 1` values.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        let max_ms = self.max_delay.as_millis() as f64;
        std::iter::successors(Some(self.initial_delay.as_millis() as f64), move |ms| {
            Some((ms * self.multiplier).min(max_ms))
        })
        .map(move |ms| Duration::from_millis(ms.min(max_ms) as u64))
        .take(self.max_attempts.saturating_sub(1) as usize)
    }

    /// Run `op` until it succeeds, fails permanently, or the attempts are used up.
    ///
    /// Transient failures and timeouts are retried. A `RateLimited` hint longer than the
    /// scheduled delay replaces it. Exhaustion yields `ClassificationUnavailable` for
    /// `unit`; permanent errors are returned unchanged. Cancellation interrupts both the
    /// attempt and the backoff sleep and yields `Cancelled`.
    pub async fn run<T, F, Fut>(
        &self,
        unit: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let mut delays = self.delays();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(DomainError::Cancelled);
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DomainError::Cancelled),
                r = tokio::time::timeout(self.timeout, op()) => r,
            };

            let err = match result {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if !e.is_transient() => return Err(e),
                Ok(Err(e)) => e,
                Err(_) => DomainError::Transient(format!(
                    "request timed out after {}s",
                    self.timeout.as_secs()
                )),
            };

            let Some(mut delay) = delays.next() else {
                warn!(unit, attempts = attempt, error = %err, "retries exhausted");
                return Err(DomainError::ClassificationUnavailable {
                    unit: unit.to_string(),
                    attempts: attempt,
                    reason: err.to_string(),
                });
            };
            if let DomainError::RateLimited { seconds } = &err {
                delay = delay.max(Duration::from_secs(*seconds));
            }

            debug!(
                unit,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient failure, backing off"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DomainError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            multiplier: 2.0,
            max_delay: Duration::from_millis(4),
            timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn test_default_delays() {
        let policy = RetryPolicy {
            max_attempts: 6,
            ..RetryPolicy::default()
        };
        let delays: Vec<u64> = policy.delays().map(|d| d.as_millis() as u64).collect();
        assert_eq!(delays, vec![750, 1312, 2296, 4019, 5000]);
    }

    #[test]
    fn test_single_attempt_has_no_delays() {
        assert_eq!(RetryPolicy::new(1, Duration::from_secs(1)).delays().count(), 0);
        assert_eq!(RetryPolicy::new(0, Duration::from_secs(1)).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = fast_policy(3)
            .run("unit", &CancellationToken::new(), || {
                let c = Arc::clone(&c);
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(DomainError::Transient("503".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_is_classification_unavailable() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result: Result<(), _> = fast_policy(3)
            .run("positive_5#0", &CancellationToken::new(), || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err(DomainError::Transient("connection reset".into())) }
            })
            .await;
        match result {
            Err(DomainError::ClassificationUnavailable { unit, attempts, .. }) => {
                assert_eq!(unit, "positive_5#0");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result: Result<(), _> = fast_policy(5)
            .run("u", &CancellationToken::new(), || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err(DomainError::Ai("401 unauthorized".into())) }
            })
            .await;
        assert!(matches!(result, Err(DomainError::Ai(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_transient() {
        let policy = RetryPolicy {
            timeout: Duration::from_millis(10),
            ..fast_policy(2)
        };
        let result: Result<(), _> = policy
            .run("u", &CancellationToken::new(), || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(
            result,
            Err(DomainError::ClassificationUnavailable { attempts: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_immediately() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), _> = fast_policy(3)
            .run("u", &cancel, || async { Ok(()) })
            .await;
        assert_eq!(result, Err(DomainError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_inflight_attempt() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let policy = RetryPolicy {
            timeout: Duration::from_secs(10),
            ..fast_policy(3)
        };
        let result: Result<(), _> = policy
            .run("u", &cancel, || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert_eq!(result, Err(DomainError::Cancelled));
    }
}
