use std::time::Duration;

/// Retry policy for callback delivery
/// Failed deliveries are retried with exponentially growing, capped delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,

    base_delay: Duration,

    max_delay: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy. At least one attempt is always made.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Keep trying for a long time: 60 attempts, 100ms doubling up to 30s.
    pub fn persistent() -> Self {
        Self::new(60, Duration::from_millis(100), Duration::from_secs(30))
    }

    /// Get maximum number of attempts
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay to wait after the zero-based `attempt` failed:
    /// `min(base_delay * 2^attempt, max_delay)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        2_u32
            .checked_pow(attempt)
            .and_then(|multiplier| self.base_delay.checked_mul(multiplier))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::persistent()
    }
}
