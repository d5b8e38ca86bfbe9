//! Retry with exponential backoff for rate-limited API calls

use std::future::Future;
use std::time::Duration;

use crate::Result;

/// Retry policy for one-shot generation and speech calls
///
/// Only rate-limit failures are retried; every call site constructs its own
/// attempt budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,
    /// Base delay between retries (doubles each attempt)
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(2000),
        }
    }
}

/// Compute the delay before retry number `attempt` (zero-based)
///
/// Pure exponential backoff: `base_delay * 2^attempt`, no jitter.
#[must_use]
pub fn delay_for_attempt(policy: &RetryPolicy, attempt: u32) -> Duration {
    policy
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt))
}

/// Run `call`, retrying rate-limit failures with exponential backoff
///
/// Attempts run strictly one after another. Errors that are not rate limits,
/// and the error from the final attempt, are returned unchanged.
///
/// # Errors
///
/// Returns the error of the last attempt
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_rate_limited() && attempt < policy.max_retries => {
                let delay = delay_for_attempt(policy, attempt);
                attempt += 1;
                tracing::warn!(
                    call = label,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "rate limited, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_growth() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            ..RetryPolicy::default()
        };

        assert_eq!(delay_for_attempt(&policy, 0), Duration::from_millis(100));
        assert_eq!(delay_for_attempt(&policy, 1), Duration::from_millis(200));
        assert_eq!(delay_for_attempt(&policy, 2), Duration::from_millis(400));
    }

    #[test]
    fn delay_saturates() {
        let policy = RetryPolicy {
            base_delay: Duration::MAX,
            ..RetryPolicy::default()
        };
        assert_eq!(delay_for_attempt(&policy, 40), Duration::MAX);
    }

    #[test]
    fn default_policy_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(2));
    }
}
