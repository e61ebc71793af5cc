//! # Runtime events emitted by workers and runners.
//!
//! The [`EventKind`] enum classifies event types across four groups:
//! - **Task events**: registration and per-task execution flow
//! - **Worker events**: pool start/stop, shutdown race outcome, periodic summary
//! - **Runner events**: supervision, signals, restarts
//! - **Subscriber events**: delivery problems inside the fan-out itself
//!
//! The [`Event`] struct carries the metadata (task name, reason, attempt,
//! delays, task counts) set by each kind.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use agentvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_task("health-check")
//!     .with_reason("connection refused");
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.task.as_deref(), Some("health-check"));
//! assert_eq!(ev.reason.as_deref(), Some("connection refused"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::core::TaskCounts;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets `task` (subscriber name) and `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets `task` (subscriber name) and `reason`.
    SubscriberOverflow,

    // === Task events ===
    /// Task was registered on an idle worker.
    TaskRegistered,

    /// Task run unit is being launched.
    TaskStarting,

    /// Task run returned successfully on its own.
    TaskCompleted,

    /// Task run failed. Sets `reason`.
    TaskFailed,

    /// Task run exceeded its execution deadline. Sets `timeout_ms`.
    TaskTimeoutHit,

    /// Task is being stopped by worker shutdown.
    TaskStopping,

    /// Task's stop hook returned an error (non-fatal). Sets `reason`.
    TaskStopHookFailed,

    /// Task did not stop within the shutdown deadline. Sets `timeout_ms`.
    TaskStopTimeout,

    /// Task exited after cancellation.
    TaskStopped,

    // === Worker events ===
    /// Worker is launching its tasks. Sets `counts.total`.
    WorkerStarting,

    /// All tasks launched; worker is running.
    WorkerStarted,

    /// Task launch failed; worker is in its terminal failed state. Sets `reason`.
    WorkerStartFailed,

    /// Periodic status summary. Sets `counts`.
    TasksSummary,

    /// Worker shutdown requested. Sets `timeout_ms`.
    WorkerStopping,

    /// All task stops joined within the shutdown deadline.
    AllStoppedWithin,

    /// Shutdown deadline exceeded. Sets `timeout_ms` and `reason` (stuck tasks).
    GraceExceeded,

    /// Worker reached its terminal stopped state.
    WorkerStopped,

    // === Runner events ===
    /// Runner is starting.
    RunnerStarting,

    /// Runner started its first worker and control loop.
    RunnerStarted,

    /// Runner failed to start. Sets `reason`.
    RunnerStartFailed,

    /// Runner shutdown requested.
    RunnerStopping,

    /// Runner control loop finished.
    RunnerStopped,

    /// External control signal observed. Sets `reason` (signal name).
    SignalReceived,

    /// Worker exited without being asked to.
    WorkerExited,

    /// Restart scheduled. Sets `attempt` and `delay_ms`.
    RestartScheduled,

    /// Fresh worker is running after a restart. Sets `attempt`.
    RestartSucceeded,

    /// Restart attempt failed. Sets `attempt` and `reason`.
    RestartFailed,

    /// Restart policy forbids further restarts. Sets `attempt` (restart count).
    RestartsExhausted,

    /// Configuration reload requested (hook only).
    ReloadRequested,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the task (or subscriber), if applicable.
    pub task: Option<Arc<str>>,
    /// Human-readable reason (errors, signal names, stuck task lists).
    pub reason: Option<Arc<str>>,
    /// Restart attempt number (1-based).
    pub attempt: Option<u32>,
    /// Delay before the next attempt in milliseconds.
    pub delay_ms: Option<u32>,
    /// Timeout in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Task counts for worker summaries.
    pub counts: Option<TaskCounts>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            counts: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches an attempt number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(millis(d));
        self
    }

    /// Attaches a timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(millis(d));
        self
    }

    /// Attaches task counts.
    #[inline]
    pub fn with_counts(mut self, counts: TaskCounts) -> Self {
        self.counts = Some(counts);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }
}

fn millis(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
