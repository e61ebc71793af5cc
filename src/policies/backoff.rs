//! # Backoff policy for restart delays.
//!
//! [`BackoffPolicy`] controls how delays grow across repeated restart attempts.
//! It is parameterized by:
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::first`] the initial delay;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay for attempt `n` is computed as `first × factor^n`, clamped to `max`.
//! The delay is derived purely from the attempt number, so the policy is stateless.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use agentvisor::BackoffPolicy;
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(100));
//! assert_eq!(backoff.next(1), Duration::from_millis(200));
//! // 100ms × 2^10 = 102_400ms → capped at max=10s
//! assert_eq!(backoff.next(10), Duration::from_secs(10));
//! ```

use std::time::Duration;

/// Exponential (or constant) delay schedule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay for attempt 0.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`1.0` = constant delay).
    pub factor: f64,
}

impl Default for BackoffPolicy {
    /// Returns a constant policy: `first = 100ms`, `factor = 1.0`, `max = 30s`.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 1.0,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given attempt number (0-indexed).
    ///
    /// The result is `first × factor^attempt`, clamped to [`BackoffPolicy::max`].
    /// Overflowing or non-finite intermediate values saturate at `max`, so arbitrarily
    /// large attempt numbers are safe.
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let clamped_exp = attempt.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(clamped_exp);

        if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped_secs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_zero_returns_first() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
        };
        assert_eq!(policy.next(0), Duration::from_millis(100));
    }

    #[test]
    fn test_exponential_growth() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(1),
            max: Duration::from_secs(30),
            factor: 2.0,
        };
        assert_eq!(policy.next(1), Duration::from_secs(2));
        assert_eq!(policy.next(2), Duration::from_secs(4));
        assert_eq!(policy.next(4), Duration::from_secs(16));
    }

    #[test]
    fn test_constant_factor() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 1.0,
        };
        for attempt in 0..10 {
            assert_eq!(policy.next(attempt), Duration::from_millis(500));
        }
    }

    #[test]
    fn test_first_exceeds_max() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(10),
            max: Duration::from_secs(5),
            factor: 2.0,
        };
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn test_non_finite_overflow_clamps_to_max() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(10),
            factor: 2.0,
        };
        assert_eq!(policy.next(100), Duration::from_secs(10));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(10));
    }
}
