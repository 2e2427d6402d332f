//! Bounded retry for fetches.

use std::fmt::Display;

use tracing::debug;

use crate::config::QueryConfig;

/// Errors that may go away if the same fetch is repeated.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for educamais_client::Error {
    fn is_retryable(&self) -> bool {
        educamais_client::Error::is_retryable(self)
    }
}

/// Run `fetcher` until it succeeds, fails with a non-retryable error, or
/// `config.retry` retries are spent.
pub(crate) async fn with_retry<V, E, F, Fut>(config: &QueryConfig, fetcher: &F) -> Result<V, E>
where
    E: Retryable + Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<V, E>>,
{
    let mut attempt = 0;
    loop {
        match fetcher().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < config.retry && e.is_retryable() => {
                let delay = config.backoff(attempt);
                attempt += 1;
                debug!(attempt, ?delay, error = %e, "Fetch failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn config(retry: u32) -> QueryConfig {
        QueryConfig::new()
            .with_retry(retry)
            .with_retry_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_transient_errors_retried_then_surface() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let fetcher = move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(TestError::Transient)
            }
        };

        let result = with_retry(&config(2), &fetcher).await;
        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let fetcher = move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(TestError::Fatal)
            }
        };

        assert_eq!(with_retry(&config(2), &fetcher).await, Err(TestError::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let fetcher = move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TestError::Transient)
                } else {
                    Ok(7)
                }
            }
        };

        assert_eq!(with_retry(&config(2), &fetcher).await, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
