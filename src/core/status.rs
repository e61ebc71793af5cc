//! Lifecycle statuses and read-only snapshots.
//!
//! ```text
//! TaskStatus:    Pending → Running → { Completed | Failed | Stopping → { Stopped | Failed } }
//! WorkerStatus:  Idle → Starting → { Running | Failed };  Running → Stopping → Stopped
//! RunnerStatus:  Idle → Starting → { Running | Failed };  Running ⇄ Restarting;
//!                { Running | Restarting } → Stopping → Stopped
//! ```

use std::fmt;
use std::time::SystemTime;

use crate::error::{RuntimeError, TaskError};

/// Lifecycle status of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Registered, not launched yet.
    Pending,
    /// Run unit is executing.
    Running,
    /// Shutdown has cancelled the task and is waiting for it.
    Stopping,
    /// Exited after cancellation.
    Stopped,
    /// Run failed, timed out, or did not stop in time.
    Failed,
    /// Run returned successfully on its own.
    Completed,
}

impl TaskStatus {
    /// Returns `true` for statuses a task never leaves within one worker lifetime.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Stopped | TaskStatus::Failed | TaskStatus::Completed
        )
    }

    /// Lowercase name used in messages and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Stopping => "stopping",
            TaskStatus::Stopped => "stopped",
            TaskStatus::Failed => "failed",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate status of a [`Worker`](crate::Worker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerStatus {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl WorkerStatus {
    /// Lowercase name used in messages and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerStatus::Idle => "idle",
            WorkerStatus::Starting => "starting",
            WorkerStatus::Running => "running",
            WorkerStatus::Stopping => "stopping",
            WorkerStatus::Stopped => "stopped",
            WorkerStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a [`Runner`](crate::Runner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunnerStatus {
    Idle,
    Starting,
    Running,
    Restarting,
    Stopping,
    Stopped,
    Failed,
}

impl RunnerStatus {
    /// Lowercase name used in messages and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            RunnerStatus::Idle => "idle",
            RunnerStatus::Starting => "starting",
            RunnerStatus::Running => "running",
            RunnerStatus::Restarting => "restarting",
            RunnerStatus::Stopping => "stopping",
            RunnerStatus::Stopped => "stopped",
            RunnerStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one task's runtime record.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInfo {
    /// Task name (unique within its worker).
    pub name: String,
    /// Current status.
    pub status: TaskStatus,
    /// Set when the task was launched.
    pub started_at: Option<SystemTime>,
    /// Set when the task reached a terminal status.
    pub stopped_at: Option<SystemTime>,
    /// Last failure, if any.
    pub error: Option<TaskError>,
}

impl TaskInfo {
    pub(crate) fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TaskStatus::Pending,
            started_at: None,
            stopped_at: None,
            error: None,
        }
    }
}

/// Per-status task counters carried by summary events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub total: usize,
    pub running: usize,
    pub failed: usize,
    pub completed: usize,
}

impl TaskCounts {
    /// Tallies a set of task snapshots.
    pub fn tally<'a>(infos: impl IntoIterator<Item = &'a TaskInfo>) -> Self {
        infos.into_iter().fold(Self::default(), |mut acc, info| {
            acc.total += 1;
            match info.status {
                TaskStatus::Running => acc.running += 1,
                TaskStatus::Failed => acc.failed += 1,
                TaskStatus::Completed => acc.completed += 1,
                _ => {}
            }
            acc
        })
    }
}

/// Snapshot of a runner and its current worker.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerInfo {
    pub status: RunnerStatus,
    pub restart_count: u32,
    /// `None` when no worker is attached.
    pub worker_status: Option<WorkerStatus>,
    pub worker_tasks: Vec<TaskInfo>,
    pub last_error: Option<RuntimeError>,
}
