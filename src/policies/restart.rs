//! # Restart policy for the runner.
//!
//! [`RestartPolicy`] decides whether the [`Runner`](crate::Runner) may replace a worker
//! that exited, and how long to wait before doing so.
//!
//! ```text
//! enabled = false              → a worker exit shuts the runner down
//! enabled, max_restarts = 0    → unlimited restarts
//! enabled, max_restarts = N    → at most N restarts over the runner's lifetime
//!
//! exponential = false          → every restart waits `delay`
//! exponential = true           → restart k waits delay × 2^k, capped at MAX_DELAY
//! ```

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Supervision policy applied across worker instances.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RestartPolicy {
    /// Restart the worker when it exits on its own.
    pub enabled: bool,
    /// Restart cap (`0` = unlimited).
    pub max_restarts: u32,
    /// Base delay before a restart.
    pub delay: Duration,
    /// Double the delay for every attempt.
    pub exponential: bool,
}

impl Default for RestartPolicy {
    /// Restarts disabled, unlimited cap, 10s constant delay.
    fn default() -> Self {
        Self {
            enabled: false,
            max_restarts: 0,
            delay: Duration::from_secs(10),
            exponential: false,
        }
    }
}

impl RestartPolicy {
    /// Ceiling for exponentially growing delays.
    pub const MAX_DELAY: Duration = Duration::from_secs(10 * 60);

    /// Returns the delay before restart `attempt` (0-indexed).
    ///
    /// Without exponential backoff this is always [`RestartPolicy::delay`].
    /// With it, `delay × 2^attempt`, never exceeding [`RestartPolicy::MAX_DELAY`].
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use agentvisor::RestartPolicy;
    ///
    /// let policy = RestartPolicy {
    ///     delay: Duration::from_secs(5),
    ///     exponential: true,
    ///     ..RestartPolicy::default()
    /// };
    /// assert_eq!(policy.delay_for(3), Duration::from_secs(40));
    /// assert_eq!(policy.delay_for(1_000), RestartPolicy::MAX_DELAY);
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.delay;
        }
        BackoffPolicy {
            first: self.delay,
            max: Self::MAX_DELAY,
            factor: 2.0,
        }
        .next(attempt)
    }

    /// Whether `restarts` already performed reach the cap.
    pub fn is_exhausted(&self, restarts: u32) -> bool {
        self.max_restarts > 0 && restarts >= self.max_restarts
    }

    /// Whether another restart is allowed after `restarts` restarts.
    pub fn permits(&self, restarts: u32) -> bool {
        self.enabled && !self.is_exhausted(restarts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(exponential: bool) -> RestartPolicy {
        RestartPolicy {
            enabled: true,
            max_restarts: 0,
            delay: Duration::from_secs(5),
            exponential,
        }
    }

    #[test]
    fn constant_delay_without_backoff() {
        let p = policy(false);
        for attempt in [0, 1, 2, 3, 50, u32::MAX] {
            assert_eq!(p.delay_for(attempt), Duration::from_secs(5));
        }
    }

    #[test]
    fn doubles_with_backoff() {
        let p = policy(true);
        assert_eq!(p.delay_for(0), Duration::from_secs(5));
        assert_eq!(p.delay_for(1), Duration::from_secs(10));
        assert_eq!(p.delay_for(2), Duration::from_secs(20));
        assert_eq!(p.delay_for(3), Duration::from_secs(40));
    }

    #[test]
    fn backoff_saturates_at_ceiling() {
        let p = policy(true);
        // 5s × 2^7 = 640s > 600s
        assert_eq!(p.delay_for(7), RestartPolicy::MAX_DELAY);
        for attempt in [8, 31, 64, 1_000, u32::MAX] {
            let d = p.delay_for(attempt);
            assert!(d <= RestartPolicy::MAX_DELAY, "attempt {attempt}: {d:?}");
            assert_eq!(d, RestartPolicy::MAX_DELAY);
        }
    }

    #[test]
    fn zero_cap_is_unlimited() {
        let p = policy(false);
        assert!(!p.is_exhausted(u32::MAX));
        assert!(p.permits(1_000));
    }

    #[test]
    fn cap_is_enforced() {
        let p = RestartPolicy {
            max_restarts: 3,
            ..policy(false)
        };
        assert!(p.permits(2));
        assert!(!p.permits(3));
        assert!(p.is_exhausted(4));
    }

    #[test]
    fn disabled_never_permits() {
        let p = RestartPolicy {
            enabled: false,
            ..policy(false)
        };
        assert!(!p.permits(0));
    }
}
