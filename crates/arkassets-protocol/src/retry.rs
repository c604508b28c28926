//! Retry policy with exponential backoff

use rand::{RngExt, rng};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_backoff: Duration,

    /// Upper bound for any single delay
    pub max_backoff: Duration,

    /// Backoff multiplier
    pub multiplier: f64,

    /// Add up to 30% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Create retry policy from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: env_or("ARKASSETS_MAX_RETRIES", defaults.max_attempts),
            initial_backoff: Duration::from_millis(env_or(
                "ARKASSETS_RETRY_BACKOFF_MS",
                defaults.initial_backoff.as_millis() as u64,
            )),
            max_backoff: Duration::from_secs(env_or(
                "ARKASSETS_MAX_BACKOFF_SECS",
                defaults.max_backoff.as_secs(),
            )),
            multiplier: env_or("ARKASSETS_BACKOFF_MULTIPLIER", defaults.multiplier),
            jitter: env_or("ARKASSETS_RETRY_JITTER", defaults.jitter),
        }
    }

    /// Backoff before retry number `retry` (zero based), without jitter
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.min(i32::MAX as u32) as i32);
        let secs = (self.initial_backoff.as_secs_f64() * factor).min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Execute a function with retry logic
    ///
    /// Errors whose `should_retry()` is false are returned immediately.
    pub async fn execute<F, Fut, T>(&self, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;

        loop {
            match f().await {
                Ok(result) => return Ok(result),
                Err(e) if !e.should_retry() || retry >= self.max_attempts => return Err(e),
                Err(e) => {
                    let mut delay = self.backoff(retry);
                    if self.jitter {
                        let jitter = rng().random_range(0.0..0.3);
                        #[allow(clippy::cast_precision_loss)]
                        let jitter_ms = (delay.as_millis() as f64 * jitter) as u64;
                        delay += Duration::from_millis(jitter_ms);
                    }

                    retry += 1;
                    warn!(
                        "Attempt {} of {} failed: {}, retrying in {:?}",
                        retry,
                        self.max_attempts + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(
    unsafe_code,
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::significant_drop_tightening
)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use reqwest::StatusCode;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            multiplier: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_backoff_progression_is_capped() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(500));
        assert_eq!(policy.backoff(40), Duration::from_millis(500));
    }

    #[test]
    fn test_from_env_custom_values() {
        unsafe {
            std::env::set_var("ARKASSETS_MAX_RETRIES", "5");
            std::env::set_var("ARKASSETS_RETRY_BACKOFF_MS", "40");
            std::env::set_var("ARKASSETS_RETRY_JITTER", "false");
        }

        let policy = RetryPolicy::from_env();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(40));
        assert_eq!(policy.max_backoff, Duration::from_secs(10));
        assert!(!policy.jitter);

        for var in [
            "ARKASSETS_MAX_RETRIES",
            "ARKASSETS_RETRY_BACKOFF_MS",
            "ARKASSETS_RETRY_JITTER",
        ] {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = fast(3)
            .execute(|| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ProtocolError::ServerError(StatusCode::BAD_GATEWAY))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.expect("Test operation should succeed"), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<()> = fast(3)
            .execute(|| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ProtocolError::HttpStatus(StatusCode::NOT_FOUND))
                }
            })
            .await;

        assert!(matches!(result, Err(ProtocolError::HttpStatus(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<()> = fast(2)
            .execute(|| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ProtocolError::Timeout)
                }
            })
            .await;

        assert!(matches!(result, Err(ProtocolError::Timeout)));
        // initial attempt plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        calls.store(0, Ordering::SeqCst);
        let counter = Arc::clone(&calls);
        let _: Result<()> = RetryPolicy::none()
            .execute(|| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ProtocolError::Timeout)
                }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
