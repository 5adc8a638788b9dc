//! Bounded retry for rate-limited Bot API calls
//!
//! Telegram advertises the wait interval on 429 responses. Interactive
//! paths honor it once with a hard cap so a hostile interval can never pin
//! a request handler; longer waits are handed to the scheduler instead.

use std::future::Future;
use std::time::Duration;

use super::TgError;

/// Longest advertised interval honored inline
pub const MAX_INLINE_BACKOFF: Duration = Duration::from_secs(30);

/// Run a Bot API call, sleeping and retrying once on `RetryAfter`
///
/// Intervals above [`MAX_INLINE_BACKOFF`] are not slept on; the original
/// error is returned so the caller can defer the work.
///
/// # Errors
///
/// Returns the underlying [`TgError`] when the call fails twice or the
/// advertised interval exceeds the inline cap
pub async fn retry_once<T, F, Fut>(op: F) -> Result<T, TgError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, TgError>>,
{
    match op().await {
        Err(TgError::RetryAfter(seconds)) => {
            let wait = Duration::from_secs(seconds);
            if wait > MAX_INLINE_BACKOFF {
                tracing::warn!(seconds, "retry interval exceeds inline cap, giving up");
                return Err(TgError::RetryAfter(seconds));
            }
            tracing::debug!(seconds, "rate limited, sleeping before retry");
            tokio::time::sleep(wait).await;
            op().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn passes_through_success() {
        let result = retry_once(|| async { Ok::<_, TgError>(5) }).await;
        assert_eq!(result.unwrap(), 5);
    }

    #[tokio::test]
    async fn retries_once_after_rate_limit() {
        let attempts = AtomicU32::new(0);
        let result = retry_once(|| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(TgError::RetryAfter(0))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry_once(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(TgError::ChatNotFound) }
        })
        .await;
        assert!(matches!(result, Err(TgError::ChatNotFound)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refuses_oversized_intervals() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry_once(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(TgError::RetryAfter(3600)) }
        })
        .await;
        assert!(matches!(result, Err(TgError::RetryAfter(3600))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
