use std::time::Duration;

use crate::config::{MAX_AUTO_RETRIES, RETRY_BASE_DELAY_MS, RETRY_MAX_DELAY_MS};

/// Linear backoff with a cap and a ceiling on automatic attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(RETRY_MAX_DELAY_MS),
            max_retries: MAX_AUTO_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next automatic retry, or `None` once the ceiling is
    /// reached and only a manual refresh can recover.
    pub fn next_delay(&self, consecutive_failures: u32) -> Option<Duration> {
        if consecutive_failures == 0 || consecutive_failures >= self.max_retries {
            return None;
        }
        Some(
            self.base_delay
                .saturating_mul(consecutive_failures)
                .min(self.max_delay),
        )
    }

    pub fn exhausted(&self, consecutive_failures: u32) -> bool {
        consecutive_failures >= self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.next_delay(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_secs(2)));
        assert_eq!(policy.next_delay(4), Some(Duration::from_secs(4)));
    }

    #[test]
    fn test_no_retry_without_failure() {
        assert_eq!(RetryPolicy::default().next_delay(0), None);
    }

    #[test]
    fn test_ceiling_stops_retries() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.next_delay(5), None);
        assert_eq!(policy.next_delay(6), None);
        assert!(policy.exhausted(5));
        assert!(!policy.exhausted(4));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
            max_retries: 10,
        };
        assert_eq!(policy.next_delay(2), Some(Duration::from_secs(8)));
        assert_eq!(policy.next_delay(3), Some(Duration::from_secs(10)));
        assert_eq!(policy.next_delay(9), Some(Duration::from_secs(10)));
    }
}
