use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::counter;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded retry for units of work that lose races against other writers.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(500),
        }
    }
}

impl From<&AppConfig> for RetryPolicy {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            max_attempts: cfg.max_conflict_retries.max(1),
            base_delay: cfg.retry_base_delay(),
            ..Default::default()
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff with up to 50% random jitter, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(self.max_delay);
        let jitter_cap = (capped.as_millis() as u64 / 2).max(1);
        let jitter = rand::thread_rng().gen_range(0..=jitter_cap);
        capped + Duration::from_millis(jitter)
    }

    /// Runs `attempt` until it succeeds, fails with a non-retryable error, or
    /// `max_attempts` is reached. The closure receives the 1-based attempt number
    /// and must open its own transaction.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, ServiceError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut n = 1;
        loop {
            match attempt(n).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && n < self.max_attempts => {
                    let delay = self.delay_for(n);
                    counter!("tableside_db.retry", 1, "operation" => operation);
                    debug!(operation, attempt = n, delay_ms = delay.as_millis() as u64, error = %err, "Retrying after conflict");
                    tokio::time::sleep(delay).await;
                    n += 1;
                }
                Err(err) => {
                    if err.is_retryable() {
                        warn!(operation, attempts = n, error = %err, "Giving up after repeated conflicts");
                    }
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn delay_is_capped() {
        let policy = fast();
        for attempt in 1..10 {
            assert!(policy.delay_for(attempt) <= Duration::from_millis(6));
        }
    }

    #[tokio::test]
    async fn retries_conflicts_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = fast()
            .run("test", move |_| async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ServiceError::Conflict("busy".into()))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_at_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = fast()
            .run("test", move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::Conflict("busy".into()))
            })
            .await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_validation_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = fast()
            .run("test", move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::ValidationError("bad".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
