//! Automatic retry with exponential backoff.
//!
//! Retries transient API errors (429, 408, 5xx, network timeouts) with a
//! delay that multiplies after each failed attempt. Never retries auth or
//! validation errors.

use std::time::Duration;

/// Configuration for retry behavior.
///
/// The delay between attempt `i` and `i + 1` (1-indexed) is
/// `initial_delay * multiplier^(i - 1)`, uncapped and without jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one. `1` disables retries.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Backoff multiplier (2.0 doubles the delay every attempt).
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a config with the given total attempt count.
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts.max(1),
            ..Default::default()
        }
    }

    /// A config that never retries.
    pub fn no_retry() -> Self {
        Self::with_attempts(1)
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Delay to wait after the failed attempt number `attempt` (1-indexed)
    /// before making the next one.
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

/// The full delay schedule for an exhausted retry sequence.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts)
            .map(|attempt| self.delay_after_attempt(attempt))
            .collect()
    }
}

/// Whether an HTTP status indicates a transient (retryable) failure.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 409 | 425 | 429) || (500..=599).contains(&status)
}

/// Whether an HTTP status is a permanent failure (auth or validation).
pub fn is_permanent_status(status: u16) -> bool {
    (400..=499).contains(&status) && !is_transient_status(status)
}
