//! Retry policy
//!
//! Bounded exponential backoff for one delivery chain: after failed attempt
//! `n`, attempt `n+1` runs `base * 2^n` later, up to the attempt ceiling.
//! No jitter; the schedule must be deterministic.

use formcraft_core::WebhookConfig;
use std::time::Duration;

/// Retry policy for one delivery chain
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts (initial + retries)
    pub max_attempts: u32,
    /// Backoff base delay
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &WebhookConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.backoff_base(),
        }
    }

    /// Delay between failed attempt `n` and attempt `n + 1`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.min(20))
    }

    /// Whether another attempt may follow failed attempt `n`
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(0), Duration::from_secs(1));
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
    }

    #[test]
    fn test_attempt_ceiling() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::from_config(&WebhookConfig::default());
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
    }
}
