use std::time::Duration;

/// What the retry loop should do after a retryable attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Budget exhausted; stop and report a timeout.
    Exhausted,
    /// Retry after the given delay.
    After(Duration),
}

/// Exponential backoff with a cap, bounded by the remaining call budget.
///
/// There is no attempt limit: conflicts are retried until the overall timeout
/// of the call elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound on a single backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Polling cadence used when a wait has no explicit poll interval:
    /// start fast, slow down to 10s.
    pub fn default_polling() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        }
    }

    /// Raw delay for a 1-based attempt: base * 2^(attempt-1), capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(exp).min(self.max_delay)
    }

    /// Decide the next sleep after `attempt` failed, given the time left in
    /// the call budget.
    pub fn next(&self, attempt: u32, remaining: Duration) -> Backoff {
        if remaining.is_zero() {
            return Backoff::Exhausted;
        }
        Backoff::After(self.delay_for(attempt).min(remaining))
    }
}
