//! Retry policy for the whole-pass restart loop
//!
//! The original design restarted a failed pass forever with no backoff. The
//! restart itself is kept (a full re-scan is safe and idempotent) but the
//! policy is explicit and bounded here.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded exponential backoff applied between pass restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of restarts after the first failed pass
    pub max_retries: u32,
    /// Delay before the first restart
    pub initial_delay: Duration,
    /// Upper bound for the delay between restarts
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Create a new retry policy.
    ///
    /// Returns an error message when the multiplier or delays are inconsistent.
    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Result<Self, String> {
        if backoff_multiplier < 1.0 {
            return Err("backoff multiplier must be at least 1.0".to_string());
        }
        if initial_delay > max_delay {
            return Err("initial delay cannot be greater than max delay".to_string());
        }
        Ok(Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff_multiplier,
        })
    }

    /// Calculate the delay before restart number `attempt` (zero-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }

        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(delay_ms as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_delay_progression() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(30), Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_policy_rejected() {
        assert!(RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(10), 0.5).is_err());
        assert!(RetryPolicy::new(3, Duration::from_secs(20), Duration::from_secs(10), 2.0).is_err());
    }

    proptest! {
        #[test]
        fn test_delay_never_exceeds_max(attempt in 0u32..64) {
            let policy = RetryPolicy::default();
            prop_assert!(policy.delay_for_attempt(attempt) <= policy.max_delay);
        }
    }
}
