//! # Runtime configuration.
//!
//! [`WorkerConfig`] and [`RunnerConfig`] are plain structs consumed by
//! [`Worker::new`](crate::Worker::new) and [`Runner::builder`](crate::Runner::builder).
//! The core only rejects values it cannot operate with (zero capacity, zero
//! shutdown timeout). Range checks for operator-supplied files live in
//! [`validate`](WorkerConfig::validate), called by the [`loader`].
//!
//! ## Sentinel values
//! - `task_timeout = 0s` → tasks run without an execution deadline
//! - `status_interval = 0s` → no periodic `TasksSummary`
//! - `restart.max_restarts = 0` → unlimited restarts (when enabled)

pub mod loader;

use std::ops::RangeInclusive;
use std::time::Duration;

use crate::error::RuntimeError;
use crate::policies::RestartPolicy;

const SHUTDOWN_RANGE: RangeInclusive<Duration> = Duration::from_secs(1)..=Duration::from_secs(300);
const MAX_TASKS_RANGE: RangeInclusive<usize> = 1..=1000;
const RESTART_DELAY_RANGE: RangeInclusive<Duration> =
    Duration::from_secs(1)..=Duration::from_secs(60);
const MAX_RESTARTS_RANGE: RangeInclusive<u32> = 0..=100;

/// Configuration of a single [`Worker`](crate::Worker).
#[derive(Clone, Debug, PartialEq)]
pub struct WorkerConfig {
    /// Maximum number of registered tasks.
    pub max_tasks: usize,

    /// Execution deadline per task run (`0s` = none).
    ///
    /// When it elapses the task's token is cancelled and the task is marked
    /// failed with [`TaskError::Timeout`](crate::TaskError::Timeout).
    pub task_timeout: Duration,

    /// Upper bound for [`Worker::stop`](crate::Worker::stop).
    pub shutdown_timeout: Duration,

    /// Stop the whole worker when any task fails.
    pub stop_on_error: bool,

    /// Period of the `TasksSummary` event (`0s` = disabled).
    pub status_interval: Duration,
}

impl WorkerConfig {
    /// Returns the task execution deadline as an `Option`.
    #[inline]
    pub fn task_deadline(&self) -> Option<Duration> {
        (!self.task_timeout.is_zero()).then_some(self.task_timeout)
    }

    /// Checks the configuration against the operator-facing ranges.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use agentvisor::WorkerConfig;
    ///
    /// let cfg = WorkerConfig { max_tasks: 0, ..WorkerConfig::default() };
    /// assert!(cfg.validate().is_err());
    /// assert!(WorkerConfig::default().validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), RuntimeError> {
        check_duration("worker.shutdown_timeout", self.shutdown_timeout, &SHUTDOWN_RANGE)?;
        if !MAX_TASKS_RANGE.contains(&self.max_tasks) {
            return Err(RuntimeError::Init(format!(
                "worker.max_tasks must be between {} and {}, got {}",
                MAX_TASKS_RANGE.start(),
                MAX_TASKS_RANGE.end(),
                self.max_tasks
            )));
        }
        Ok(())
    }
}

impl Default for WorkerConfig {
    /// Default configuration:
    ///
    /// - `max_tasks = 100`
    /// - `task_timeout = 5min`
    /// - `shutdown_timeout = 30s`
    /// - `stop_on_error = false`
    /// - `status_interval = 30s`
    fn default() -> Self {
        Self {
            max_tasks: 100,
            task_timeout: Duration::from_secs(5 * 60),
            shutdown_timeout: Duration::from_secs(30),
            stop_on_error: false,
            status_interval: Duration::from_secs(30),
        }
    }
}

/// Configuration of the [`Runner`](crate::Runner).
#[derive(Clone, Debug, PartialEq)]
pub struct RunnerConfig {
    /// Upper bound for tearing down a worker on shutdown or restart.
    pub shutdown_timeout: Duration,

    /// Restart policy.
    pub restart: RestartPolicy,
}

impl RunnerConfig {
    /// Returns a config with the default 60s shutdown timeout and the given restart policy.
    pub fn with_restart(restart: RestartPolicy) -> Self {
        Self {
            restart,
            ..Self::default()
        }
    }

    /// Checks the configuration against the operator-facing ranges.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        check_duration("runner.shutdown_timeout", self.shutdown_timeout, &SHUTDOWN_RANGE)?;
        check_duration("runner.restart.delay", self.restart.delay, &RESTART_DELAY_RANGE)?;
        if !MAX_RESTARTS_RANGE.contains(&self.restart.max_restarts) {
            return Err(RuntimeError::Init(format!(
                "runner.restart.max_restarts must be between {} and {}, got {}",
                MAX_RESTARTS_RANGE.start(),
                MAX_RESTARTS_RANGE.end(),
                self.restart.max_restarts
            )));
        }
        Ok(())
    }
}

impl Default for RunnerConfig {
    /// Default configuration: `shutdown_timeout = 60s`, restarts disabled.
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(60),
            restart: RestartPolicy::default(),
        }
    }
}

fn check_duration(
    field: &str,
    value: Duration,
    range: &RangeInclusive<Duration>,
) -> Result<(), RuntimeError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(RuntimeError::Init(format!(
            "{field} must be between {:?} and {:?}, got {value:?}",
            range.start(),
            range.end()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(WorkerConfig::default().validate().is_ok());
        assert!(RunnerConfig::default().validate().is_ok());
        assert_eq!(RunnerConfig::default().shutdown_timeout, Duration::from_secs(60));
    }

    #[test]
    fn worker_ranges_are_enforced() {
        let too_short = WorkerConfig {
            shutdown_timeout: Duration::from_millis(500),
            ..WorkerConfig::default()
        };
        let err = too_short.validate().unwrap_err();
        assert!(err.to_string().contains("worker.shutdown_timeout"));

        let too_many = WorkerConfig {
            max_tasks: 1001,
            ..WorkerConfig::default()
        };
        let err = too_many.validate().unwrap_err();
        assert_eq!(
            err,
            RuntimeError::Init("worker.max_tasks must be between 1 and 1000, got 1001".into())
        );
    }

    #[test]
    fn runner_ranges_are_enforced() {
        let mut cfg = RunnerConfig::with_restart(RestartPolicy {
            enabled: true,
            max_restarts: 101,
            delay: Duration::from_secs(5),
            exponential: false,
        });
        assert!(cfg.validate().unwrap_err().to_string().contains("max_restarts"));

        cfg.restart.max_restarts = 100;
        assert!(cfg.validate().is_ok());

        cfg.restart.delay = Duration::from_secs(61);
        assert!(cfg.validate().unwrap_err().to_string().contains("runner.restart.delay"));
    }

    #[test]
    fn zero_task_timeout_means_no_deadline() {
        let cfg = WorkerConfig {
            task_timeout: Duration::ZERO,
            ..WorkerConfig::default()
        };
        assert_eq!(cfg.task_deadline(), None);
        assert_eq!(
            WorkerConfig::default().task_deadline(),
            Some(Duration::from_secs(300))
        );
    }
}
