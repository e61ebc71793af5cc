//! Error types used by the agentvisor runtime and tasks.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`]: lifecycle errors raised by the [`Worker`](crate::Worker)
//!   and [`Runner`](crate::Runner) (wrong phase, capacity, restart failures).
//! - [`TaskError`]: errors raised by individual task executions.
//!
//! Both types provide `as_label` for logs/metrics. Both are `Clone` so they can be
//! stored in snapshots ([`TaskInfo`](crate::TaskInfo), [`RunnerInfo`](crate::RunnerInfo))
//! and handed out to readers without holding a lock.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the agentvisor runtime.
///
/// Every lifecycle operation (`register_task`, `start`, `stop`, `restart`) reports
/// failures synchronously with one of these variants. Messages always name the
/// current lifecycle phase when the failure is a wrong-phase call.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// Invalid configuration or dependency at construction time.
    #[error("failed to initialize: {0}")]
    Init(String),

    /// Task could not be registered (duplicate, capacity, wrong phase).
    #[error("failed to register task: {0}")]
    Registration(String),

    /// Start was rejected or a task launch failed.
    #[error("failed to start: {0}")]
    Start(String),

    /// Stop was rejected (wrong phase).
    #[error("failed to stop: {0}")]
    Stop(String),

    /// Restart already in progress, or the worker could not be replaced.
    #[error("failed to restart: {0}")]
    Restart(String),

    /// Building, registering or starting a worker on behalf of the runner failed.
    #[error("worker management error: {0}")]
    WorkerManage(String),

    /// Shutdown deadline was exceeded; some tasks did not stop in time.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured shutdown timeout.
        grace: Duration,
        /// Tasks that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use agentvisor::RuntimeError;
    ///
    /// let err = RuntimeError::Stop("worker is not running, current status: idle".into());
    /// assert_eq!(err.as_label(), "runtime_stop");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Init(_) => "runtime_init",
            RuntimeError::Registration(_) => "runtime_registration",
            RuntimeError::Start(_) => "runtime_start",
            RuntimeError::Stop(_) => "runtime_stop",
            RuntimeError::Restart(_) => "runtime_restart",
            RuntimeError::WorkerManage(_) => "runtime_worker_manage",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Errors produced by task execution.
///
/// A task's own failure is never returned to the caller of a worker operation.
/// It is recorded on the task's [`TaskInfo`](crate::TaskInfo) and published as an event.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Task body failed.
    #[error("task execution error: {error}")]
    Execution {
        /// The underlying error message.
        error: String,
    },

    /// Task run exceeded its execution deadline.
    #[error("task timeout: run exceeded {timeout:?}")]
    Timeout {
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// Task did not stop within the shutdown deadline.
    #[error("task timeout: stop exceeded {grace:?}")]
    ShutdownTimeout {
        /// The shutdown deadline that was exceeded.
        grace: Duration,
    },

    /// Task observed cancellation of its context.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Shorthand for [`TaskError::Execution`].
    pub fn execution(error: impl Into<String>) -> Self {
        TaskError::Execution {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use agentvisor::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Execution { .. } => "task_failed",
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::ShutdownTimeout { .. } => "task_shutdown_timeout",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Whether the error is a deadline (run deadline or shutdown deadline).
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            TaskError::Timeout { .. } | TaskError::ShutdownTimeout { .. }
        )
    }

    /// Whether the task exited because its context was cancelled.
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}
