//! Lazy Pirate retry policy for request/reply against an unreliable master.
//!
//! From zguide Chapter 4: poll with a timeout, and when no reply arrives
//! close the socket, open a fresh one and resend. A REQ/DEALER socket that
//! timed out may still deliver the stale reply later, so reopening is the
//! only way to get a clean request/reply pairing.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyPirateConfig {
    /// Timeout per request attempt
    pub timeout: Duration,
    /// Retries after the first attempt fails
    pub max_retries: u32,
    /// Initial backoff between retries
    pub backoff_base: Duration,
    /// Maximum backoff between retries (caps exponential growth)
    pub backoff_max: Duration,
}

impl Default for LazyPirateConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(800),
            max_retries: 1,
            backoff_base: Duration::from_millis(100),
            backoff_max: Duration::from_millis(500),
        }
    }
}

impl LazyPirateConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    /// Calculate backoff delay for a given attempt number
    ///
    /// attempt n: min(backoff_base * 2^(n-1), backoff_max), none before the first
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.backoff_base.saturating_mul(multiplier);
        std::cmp::min(delay, self.backoff_max)
    }

    /// Upper bound on how long one fetch can take, backoff included.
    pub fn worst_case(&self) -> Duration {
        let attempts = self.max_retries.saturating_add(1);
        let mut total = self.timeout.saturating_mul(attempts);
        for retry in 1..=self.max_retries {
            total = total.saturating_add(self.backoff_for_attempt(retry));
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_calculation() {
        let config = LazyPirateConfig::default()
            .with_backoff(Duration::from_millis(100), Duration::from_secs(5));

        assert_eq!(config.backoff_for_attempt(0), Duration::ZERO);
        assert_eq!(config.backoff_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.backoff_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.backoff_for_attempt(3), Duration::from_millis(400));
        assert_eq!(config.backoff_for_attempt(7), Duration::from_secs(5));
        assert_eq!(config.backoff_for_attempt(40), Duration::from_secs(5));
    }

    #[test]
    fn worst_case_includes_backoff() {
        let config = LazyPirateConfig::default()
            .with_timeout(Duration::from_millis(250))
            .with_retries(2)
            .with_backoff(Duration::from_millis(10), Duration::from_millis(15));

        // 3 attempts of 250ms, then 10ms + 15ms of backoff
        assert_eq!(config.worst_case(), Duration::from_millis(775));
    }

    #[test]
    fn default_fetch_fits_in_two_seconds() {
        // 800ms, 100ms backoff, 800ms
        let config = LazyPirateConfig::default();
        assert_eq!(config.worst_case(), Duration::from_millis(1700));
    }

    #[test]
    fn zero_retries_is_one_attempt() {
        let config = LazyPirateConfig::default()
            .with_timeout(Duration::from_millis(300))
            .with_retries(0);
        assert_eq!(config.worst_case(), Duration::from_millis(300));
    }
}
