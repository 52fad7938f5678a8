//! Retry policy: classification plus exponential backoff with jitter.
//!
//! The policy is pure configuration. Given an [`ErrorKind`] and the number of
//! the attempt that just failed, it decides whether to try again and how long
//! to wait first.
//!
//! ```text
//! delay(attempt) = clamp(base * 2^(attempt-1), max_delay)
//!                  * (1 + u),  u ~ Uniform[-jitter_fraction, +jitter_fraction]
//!                  then clamped to max_delay again
//! ```

use crate::DomainError;
use crate::agent::error_kind::{ErrorClass, ErrorKind};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry configuration and decision logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per agent per round, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Relative jitter in `[0, 1]` (0.5 means ±50%)
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter_fraction: 0.5,
        }
    }
}

impl RetryPolicy {
    // ==================== Builder Methods ====================

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter_fraction(mut self, jitter_fraction: f64) -> Self {
        self.jitter_fraction = jitter_fraction;
        self
    }

    /// Reject configurations the backoff math cannot honor.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.max_attempts == 0 {
            return Err(DomainError::InvalidRetryConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_fraction) {
            return Err(DomainError::InvalidRetryConfig(format!(
                "jitter_fraction must be within [0, 1], got {}",
                self.jitter_fraction
            )));
        }
        if self.base_delay > self.max_delay {
            return Err(DomainError::InvalidRetryConfig(format!(
                "base_delay ({:?}) exceeds max_delay ({:?})",
                self.base_delay, self.max_delay
            )));
        }
        Ok(())
    }

    // ==================== Decisions ====================

    /// Classify an error kind.
    pub fn classify(&self, kind: ErrorKind) -> ErrorClass {
        kind.classify()
    }

    /// Whether another attempt should follow the failed attempt number `attempt` (1-based).
    pub fn should_retry(&self, kind: ErrorKind, attempt: u32) -> bool {
        self.classify(kind) == ErrorClass::Retryable && attempt < self.max_attempts
    }

    /// Backoff before jitter: `base * 2^(attempt-1)`, clamped to `max_delay`.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        1u32.checked_shl(exponent)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Jittered delay for a given uniform sample in `[0, 1]`.
    ///
    /// A sample of 0.5 yields the unjittered delay; 0 and 1 yield the lower and
    /// upper jitter bounds. The result never exceeds `max_delay`.
    pub fn delay_for(&self, attempt: u32, unit_sample: f64) -> Duration {
        let sample = unit_sample.clamp(0.0, 1.0);
        let jitter = self.jitter_fraction.clamp(0.0, 1.0);
        let factor = 1.0 + jitter * (2.0 * sample - 1.0);
        let jittered = self.base_delay_for(attempt).as_secs_f64() * factor;
        Duration::from_secs_f64(jittered.max(0.0)).min(self.max_delay)
    }

    /// Delay to sleep after failed attempt number `attempt` (1-based).
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let sample = rand::rng().random_range(0.0..=1.0);
        self.delay_for(attempt, sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RetryPolicy {
        RetryPolicy::default()
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(1_000))
            .with_jitter_fraction(0.0)
    }

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
        assert_eq!(policy.jitter_fraction, 0.5);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_exponential_progression_and_clamp() {
        let policy = no_jitter();
        assert_eq!(policy.base_delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.base_delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.base_delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.base_delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.base_delay_for(5), Duration::from_millis(1_000));
        assert_eq!(policy.base_delay_for(64), Duration::from_millis(1_000));
        assert_eq!(policy.base_delay_for(u32::MAX), Duration::from_millis(1_000));
    }

    #[test]
    fn test_attempt_zero_treated_as_first() {
        assert_eq!(no_jitter().base_delay_for(0), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = no_jitter().with_jitter_fraction(0.5);
        assert_eq!(policy.delay_for(1, 0.0), Duration::from_millis(50));
        assert_eq!(policy.delay_for(1, 0.5), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1, 1.0), Duration::from_millis(150));
    }

    #[test]
    fn test_jitter_never_exceeds_max_delay() {
        let policy = no_jitter().with_jitter_fraction(0.5);
        // Clamped base is 1000ms; +50% would be 1500ms
        assert_eq!(policy.delay_for(10, 1.0), Duration::from_millis(1_000));
        for attempt in 1..=20 {
            for _ in 0..50 {
                assert!(policy.next_delay(attempt) <= policy.max_delay);
            }
        }
    }

    #[test]
    fn test_delay_non_decreasing_in_expectation() {
        let policy = RetryPolicy::default()
            .with_base_delay(Duration::from_millis(50))
            .with_max_delay(Duration::from_millis(2_000));

        let expected = |attempt: u32| -> f64 {
            let samples = 1_001;
            (0..samples)
                .map(|i| policy.delay_for(attempt, i as f64 / (samples - 1) as f64))
                .map(|d| d.as_secs_f64())
                .sum::<f64>()
                / samples as f64
        };

        let means: Vec<f64> = (1..=12).map(expected).collect();
        for pair in means.windows(2) {
            assert!(pair[1] + 1e-9 >= pair[0], "means not monotone: {means:?}");
        }
        assert!(means.iter().all(|m| *m <= policy.max_delay.as_secs_f64()));
    }

    #[test]
    fn test_should_retry_respects_class_and_limit() {
        let policy = RetryPolicy::default().with_max_attempts(3);
        assert!(policy.should_retry(ErrorKind::Network, 1));
        assert!(policy.should_retry(ErrorKind::StorageBusy, 2));
        assert!(!policy.should_retry(ErrorKind::Network, 3));
        assert!(!policy.should_retry(ErrorKind::Authentication, 1));
        assert!(!policy.should_retry(ErrorKind::Timeout, 1));
    }

    #[test]
    fn test_should_retry_every_kind() {
        let policy = RetryPolicy::default();
        for kind in ErrorKind::ALL {
            assert_eq!(
                policy.should_retry(kind, 1),
                kind.classify() == ErrorClass::Retryable,
                "{kind}"
            );
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(RetryPolicy::default().with_max_attempts(0).validate().is_err());
        assert!(RetryPolicy::default().with_jitter_fraction(1.5).validate().is_err());
        assert!(RetryPolicy::default().with_jitter_fraction(-0.1).validate().is_err());
        assert!(
            RetryPolicy::default()
                .with_base_delay(Duration::from_secs(20))
                .validate()
                .is_err()
        );
    }
}
