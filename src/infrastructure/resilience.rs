//! Retry with exponential backoff and full jitter
//!
//! Providers retry timeouts, transport failures, and 5xx/429 responses; all
//! other errors are terminal for the attempt. Sleeps are drawn uniformly from
//! `0..=cap` (full jitter) so a burst of failing batches does not resynchronize
//! against a struggling upstream.

use std::time::Duration;

use rand::Rng;

use crate::application::errors::ProviderError;
use crate::config::HttpConfig;

/// Retry budget for one logical upstream operation.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryConfig {
    pub fn from_http(http: &HttpConfig) -> Self {
        Self {
            retries: http.retries,
            initial_delay: Duration::from_millis(http.backoff_initial_ms),
            max_delay: Duration::from_millis(http.backoff_max_ms),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Execute `operation` with the configured retry budget.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= config.retries || !error.is_retryable() {
                    return Err(error);
                }
                attempt += 1;
                let cap = config
                    .initial_delay
                    .saturating_mul(2u32.saturating_pow(attempt - 1))
                    .min(config.max_delay);
                let sleep_ms = {
                    let mut rng = rand::thread_rng();
                    rng.gen_range(0..=cap.as_millis() as u64)
                };
                tracing::debug!(
                    attempt,
                    retries = config.retries,
                    sleep_ms,
                    error = %error,
                    "retrying upstream operation"
                );
                tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(retries: u32) -> RetryConfig {
        RetryConfig {
            retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let counter = Arc::new(AtomicU32::new(0));
        let result = retry_with_backoff(&fast_config(3), || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ProviderError::Http {
                        status: 500,
                        message: "boom".into(),
                    })
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result.expect("recovered"), "ok");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_retry_budget() {
        let counter = Arc::new(AtomicU32::new(0));
        let result: Result<(), _> = retry_with_backoff(&fast_config(2), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Http {
                    status: 503,
                    message: "unavailable".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        // Initial attempt plus two retries.
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn auth_failures_are_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let result: Result<(), _> = retry_with_backoff(&fast_config(5), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Auth)
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
