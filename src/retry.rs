//! Startup retry with exponential backoff
//!
//! The relay loop itself never retries inside a cycle; it simply tries again
//! on the next tick. Startup is different: before the loop exists there is no
//! next tick, so the initial node reads (chain id, head height) are retried
//! here before the process gives up.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::LedgerError;

/// Backoff schedule for startup RPC calls
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try
    pub max_retries: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential growth
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate backoff duration for a given attempt (0-indexed)
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_secs =
            self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped = backoff_secs.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Check if we should retry based on attempt count
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// Run `operation` until it succeeds, retrying only `RpcUnavailable`.
///
/// Other ledger errors are returned immediately: retrying a rejected request
/// does not change the answer.
pub async fn with_retry<F, T, Fut>(
    config: &RetryConfig,
    label: &str,
    mut operation: F,
) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LedgerError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(LedgerError::RpcUnavailable(msg)) if config.should_retry(attempt) => {
                let backoff = config.backoff_for_attempt(attempt);
                attempt += 1;
                warn!(
                    operation = label,
                    attempt,
                    max = config.max_retries,
                    ?backoff,
                    error = %msg,
                    "Node unavailable at startup, retrying after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_calculation() {
        let config = RetryConfig::default();

        assert_eq!(config.backoff_for_attempt(0), Duration::from_secs(2));
        assert_eq!(config.backoff_for_attempt(1), Duration::from_secs(4));
        assert_eq!(config.backoff_for_attempt(2), Duration::from_secs(8));
        assert_eq!(config.backoff_for_attempt(3), Duration::from_secs(16));
        assert_eq!(config.backoff_for_attempt(4), Duration::from_secs(32));
        assert_eq!(config.backoff_for_attempt(5), Duration::from_secs(60)); // capped
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_recovers_from_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&RetryConfig::default(), "current_height", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(LedgerError::RpcUnavailable("connection refused".into()))
            } else {
                Ok(42u64)
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_gives_up_after_max_retries() {
        let config = RetryConfig {
            max_retries: 2,
            ..RetryConfig::default()
        };
        let calls = AtomicU32::new(0);
        let result: Result<u64, _> = with_retry(&config, "chain_id", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::RpcUnavailable("connection refused".into()))
        })
        .await;

        assert!(matches!(result, Err(LedgerError::RpcUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_does_not_retry_rejections() {
        let calls = AtomicU32::new(0);
        let result: Result<u64, _> = with_retry(&RetryConfig::default(), "send", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::Rejected("nonce too low".into()))
        })
        .await;

        assert!(matches!(result, Err(LedgerError::Rejected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
