//! Retry wrapper for calls against the external sources.

use std::future::Future;
use std::time::Duration;

use crate::config::SyncConfig;
use crate::{Error, Result};

/// Exponential-backoff executor around a fallible unit of work.
///
/// Two failure classes get distinct treatment: a source that definitively
/// reports the record absent (`Error::NotFound`) returns `Ok(None)` with no
/// further attempts, so callers can mark the item unsyncable instead of
/// re-fetching it forever; any other failure is retried with an exponential
/// delay until the budget is spent, then surfaced as `RetriesExhausted`
/// wrapping the final cause.
#[derive(Debug, Clone)]
pub struct Backoff {
    max_retries: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl Backoff {
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.max_retries,
            config.backoff_base_ms,
            config.backoff_max_ms,
        )
    }

    /// Delay before retry number `attempt + 1`: `base * 2^attempt`, capped.
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let shift = attempt.min(63);
        let exp = 1u128 << shift;
        let ms = (self.base_delay_ms as u128).saturating_mul(exp);
        (ms.min(self.max_delay_ms as u128)) as u64
    }

    pub async fn run<T, F, Fut>(&self, context: &str, mut op: F) -> Result<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(Some(value)),
                Err(Error::NotFound(detail)) => {
                    tracing::info!(context, %detail, "source reports record absent, not retrying");
                    return Ok(None);
                }
                Err(cause) if attempt >= self.max_retries => {
                    tracing::warn!(
                        context,
                        attempts = attempt + 1,
                        %cause,
                        "retry budget exhausted"
                    );
                    return Err(Error::RetriesExhausted {
                        context: context.to_string(),
                        attempts: attempt + 1,
                        source: Box::new(cause),
                    });
                }
                Err(cause) => {
                    let delay = self.delay_ms(attempt);
                    tracing::debug!(context, attempt, delay_ms = delay, %cause, "retrying");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast() -> Backoff {
        Backoff::new(3, 0, 0)
    }

    #[tokio::test]
    async fn returns_the_value_on_first_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let out = fast()
            .run("movie 7", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                }
            })
            .await
            .unwrap();
        assert_eq!(out, Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn not_found_short_circuits_with_zero_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let out: Option<u32> = fast()
            .run("movie 7", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(Error::NotFound("movie 7".to_string()))
                }
            })
            .await
            .unwrap();
        assert_eq!(out, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_raises_after_exactly_max_retries_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = fast()
            .run::<u32, _, _>("movie 7", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(Error::BackendMessage("connection reset".to_string()))
                }
            })
            .await
            .unwrap_err();

        // Initial attempt plus max_retries retries.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match err {
            Error::RetriesExhausted {
                context, attempts, ..
            } => {
                assert_eq!(context, "movie 7");
                assert_eq!(attempts, 4);
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn recovers_when_a_retry_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let out = fast()
            .run("movie 7", move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(Error::BackendMessage("timeout".to_string()))
                    } else {
                        Ok("resolved")
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(out, Some("resolved"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn delay_doubles_and_caps() {
        let backoff = Backoff::new(5, 1_000, 5_000);
        assert_eq!(backoff.delay_ms(0), 1_000);
        assert_eq!(backoff.delay_ms(1), 2_000);
        assert_eq!(backoff.delay_ms(2), 4_000);
        assert_eq!(backoff.delay_ms(3), 5_000);
        assert_eq!(backoff.delay_ms(63), 5_000);
    }
}
