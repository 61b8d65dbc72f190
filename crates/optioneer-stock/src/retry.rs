//! Retry logic with exponential backoff
//!
//! [`RetryPolicy`] retries transient transport failures only. [`Retrying`]
//! applies a policy uniformly to any fundamentals provider.

use crate::error::{Result, StockError};
use crate::models::ProviderQuote;
use crate::resolver::FundamentalsProvider;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Initial backoff duration
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,

    /// Backoff multiplier (typically 2.0 for exponential backoff)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
            backoff_multiplier,
        }
    }

    /// A single attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Short delays for tests
    pub fn fast() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(100),
            backoff_multiplier: 2.0,
        }
    }

    fn backoff_duration(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let backoff_ms = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);

        Duration::from_millis(backoff_ms as u64).min(self.max_backoff)
    }

    /// Run `operation`, retrying transient failures with backoff
    ///
    /// Returns the first success, the first non-transient error, or the last
    /// error once attempts are exhausted.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..self.max_attempts.max(1) {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(operation = operation_name, retries = attempt, "Succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    if attempt + 1 < self.max_attempts {
                        let backoff = self.backoff_duration(attempt + 1);
                        warn!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            max_attempts = self.max_attempts,
                            error = %e,
                            ?backoff,
                            "Transient failure, retrying"
                        );
                        sleep(backoff).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        let error = last_error.unwrap_or_else(|| StockError::Timeout {
            operation: operation_name.to_string(),
        });
        warn!(operation = operation_name, error = %error, "Retries exhausted");
        Err(error)
    }
}

/// A fundamentals provider whose fetches go through a [`RetryPolicy`]
pub struct Retrying<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P> Retrying<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<P: FundamentalsProvider> FundamentalsProvider for Retrying<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch(&self, symbol: &str) -> Result<ProviderQuote> {
        let operation = format!("{} fetch {symbol}", self.inner.name());
        self.policy
            .execute(&operation, || self.inner.fetch(symbol))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metric;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(10), 2.0);

        assert_eq!(policy.backoff_duration(0), Duration::ZERO);
        assert_eq!(policy.backoff_duration(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_duration(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_duration(3), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_capped_at_max() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(5), 2.0);
        assert_eq!(policy.backoff_duration(10), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_execute_success_after_retry() {
        let attempts = AtomicU32::new(0);

        let result = RetryPolicy::fast()
            .execute("test_op", || async {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(StockError::Timeout {
                        operation: "test".to_string(),
                    })
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(tokio_test::assert_ok!(result), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_execute_exhausts_attempts() {
        let attempts = AtomicU32::new(0);

        let result: Result<()> = RetryPolicy::fast()
            .execute("test_op", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(StockError::RateLimitExceeded {
                    provider: "test".to_string(),
                })
            })
            .await;

        tokio_test::assert_err!(result);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_does_not_retry_permanent_errors() {
        let attempts = AtomicU32::new(0);

        let result: Result<()> = RetryPolicy::fast()
            .execute("test_op", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(StockError::InvalidSymbol("???".to_string()))
            })
            .await;

        assert!(matches!(result, Err(StockError::InvalidSymbol(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    struct Flaky {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl FundamentalsProvider for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn fetch(&self, _symbol: &str) -> Result<ProviderQuote> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < 2 {
                return Err(StockError::Timeout {
                    operation: "fetch".to_string(),
                });
            }
            Ok(ProviderQuote::new("flaky").with(Metric::CurrentRatio, Some(2.0)))
        }
    }

    #[tokio::test]
    async fn test_retrying_provider() {
        let calls = Arc::new(AtomicU32::new(0));
        let provider = Retrying::new(
            Flaky {
                calls: calls.clone(),
            },
            RetryPolicy::fast(),
        );

        let quote = provider.fetch("AAPL").await.unwrap();

        assert_eq!(provider.name(), "flaky");
        assert_eq!(quote.get(Metric::CurrentRatio), Some(2.0));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
