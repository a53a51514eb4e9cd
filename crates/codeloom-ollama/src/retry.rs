use std::time::Duration;

/// Retry schedule for transient request failures: exponential backoff
/// starting at `base_delay`, doubling per attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries without sleeping. Useful in tests.
    pub fn no_delay() -> Self {
        RetryPolicy {
            base_delay: Duration::ZERO,
            ..RetryPolicy::default()
        }
    }

    /// Delay before the retry following failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Connection and timeout failures are worth retrying; everything else
/// (HTTP status errors, body decode failures) is not.
pub(crate) fn is_transient(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout()
}
