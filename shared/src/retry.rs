use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

/// Bounded retry with exponential backoff, used only for the
/// registry-control HTTP calls sweep makes to delete manifests and blobs
/// (spec §4.5, §7: DB operations are never retried by GC).
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub async fn retry<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.max_attempts => return Err(err),
                Err(err) => {
                    info!(
                        attempt,
                        max_attempts = self.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        "retryable operation failed, will retry: {err}"
                    );
                    sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, self.max_backoff);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        };
        let attempts = AtomicU32::new(0);

        let result: Result<&str, &str> = policy
            .retry(|| async {
                let count = attempts.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err("timeout")
                } else {
                    Ok("ok")
                }
            })
            .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_retries_and_returns_last_error() {
        let policy = RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        };
        let attempts = AtomicU32::new(0);

        let result: Result<(), &str> = policy
            .retry(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err("persistent failure")
            })
            .await;

        assert_eq!(result, Err("persistent failure"));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
