//! # LogWriter: structured logging subscriber
//!
//! Renders runtime [`Event`]s as `tracing` records. The level is chosen per
//! event kind; event metadata becomes key-value fields.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  agentvisor::log: task registered task="health-check"
//! DEBUG agentvisor::log: tasks status total=2 running=2 failed=0 completed=0
//! WARN  agentvisor::log: task stop timeout task="uploader" timeout_ms=30000
//! ERROR agentvisor::log: task failed task="health-check" reason="task execution error: ..."
//! INFO  agentvisor::log: restart scheduled attempt=1 delay_ms=10000
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "agentvisor::log";

/// Event writer subscriber backed by `tracing`.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::SubscriberPanicked => {
                error!(target: TARGET, subscriber = task, reason, "subscriber panicked")
            }
            EventKind::SubscriberOverflow => {
                warn!(target: TARGET, subscriber = task, reason, "subscriber dropped event")
            }

            EventKind::TaskRegistered => info!(target: TARGET, task, "task registered"),
            EventKind::TaskStarting => debug!(target: TARGET, task, "starting task"),
            EventKind::TaskCompleted => debug!(target: TARGET, task, "task completed"),
            EventKind::TaskFailed => error!(target: TARGET, task, reason, "task failed"),
            EventKind::TaskTimeoutHit => {
                warn!(target: TARGET, task, timeout_ms = ?e.timeout_ms, "task run deadline exceeded")
            }
            EventKind::TaskStopping => debug!(target: TARGET, task, "stopping task"),
            EventKind::TaskStopHookFailed => {
                warn!(target: TARGET, task, reason, "task stop returned error")
            }
            EventKind::TaskStopTimeout => {
                warn!(target: TARGET, task, timeout_ms = ?e.timeout_ms, "task stop timeout")
            }
            EventKind::TaskStopped => debug!(target: TARGET, task, "task stopped"),

            EventKind::WorkerStarting => {
                let task_count = e.counts.map(|c| c.total).unwrap_or_default();
                info!(target: TARGET, task_count, "starting worker")
            }
            EventKind::WorkerStarted => info!(target: TARGET, "worker started successfully"),
            EventKind::WorkerStartFailed => {
                error!(target: TARGET, task, reason, "worker failed to start")
            }
            EventKind::TasksSummary => {
                let c = e.counts.unwrap_or_default();
                debug!(
                    target: TARGET,
                    total = c.total,
                    running = c.running,
                    failed = c.failed,
                    completed = c.completed,
                    "tasks status"
                )
            }
            EventKind::WorkerStopping => {
                info!(target: TARGET, timeout_ms = ?e.timeout_ms, "stopping worker")
            }
            EventKind::AllStoppedWithin => info!(target: TARGET, "all tasks stopped gracefully"),
            EventKind::GraceExceeded => warn!(
                target: TARGET,
                timeout_ms = ?e.timeout_ms,
                stuck = reason,
                "graceful shutdown timeout exceeded"
            ),
            EventKind::WorkerStopped => info!(target: TARGET, "worker stopped"),

            EventKind::RunnerStarting => info!(target: TARGET, "starting runner"),
            EventKind::RunnerStarted => info!(target: TARGET, "runner started successfully"),
            EventKind::RunnerStartFailed => error!(target: TARGET, reason, "runner failed to start"),
            EventKind::RunnerStopping => info!(target: TARGET, "stopping runner"),
            EventKind::RunnerStopped => info!(target: TARGET, "runner stopped"),
            EventKind::SignalReceived => info!(target: TARGET, signal = reason, "received signal"),
            EventKind::WorkerExited => {
                warn!(target: TARGET, reason, "worker stopped unexpectedly")
            }
            EventKind::RestartScheduled => info!(
                target: TARGET,
                attempt = ?e.attempt,
                delay_ms = ?e.delay_ms,
                "restarting worker"
            ),
            EventKind::RestartSucceeded => {
                info!(target: TARGET, attempt = ?e.attempt, "worker restarted successfully")
            }
            EventKind::RestartFailed => {
                error!(target: TARGET, attempt = ?e.attempt, reason, "failed to restart worker")
            }
            EventKind::RestartsExhausted => error!(
                target: TARGET,
                restarts = ?e.attempt,
                "restart limit reached, shutting down"
            ),
            EventKind::ReloadRequested => info!(target: TARGET, "config reload requested"),
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
