//! # Worker: a bounded pool of cancellable tasks.
//!
//! A [`Worker`] owns a fixed set of named tasks and drives them through one
//! lifecycle. It is single-use: once stopped (or failed) it is never started
//! again; the [`Runner`](crate::Runner) replaces it wholesale instead.
//!
//! ```text
//!   register_task ×N          start(ctx)                       stop(ctx)
//!   ─────────────────► Idle ─────────────► Starting ─► Running ─────────► Stopping ─► Stopped
//!                                              │
//!                                              └─ launch failure ─► Failed
//! ```
//!
//! ## Cancellation tree
//! ```text
//!   ctx (caller) ─┬─ task token #1 ── task.run(...)
//!                 ├─ task token #2 ── task.run(...)
//!                 └─ deadline token (stop only) ── task.stop(...)
//! ```
//!
//! ## Rules
//! - Registration only while `Idle`; names are unique; at most `max_tasks`.
//! - A task's own failure never surfaces as an `Err` from a worker operation;
//!   it is recorded on the task and published as an event.
//! - `stop` always finishes in `Stopped` within about `shutdown_timeout`;
//!   tasks that overrun are aborted and marked `Failed`.
//! - [`wait`](Worker::wait) resolves once the worker reaches a terminal status.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::SystemTime;

use futures::FutureExt;
use futures::future::join_all;
use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::core::deadline::deadline_token;
use crate::core::status::{TaskCounts, TaskInfo, TaskStatus, WorkerStatus};
use crate::error::{RuntimeError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::panic_message;
use crate::tasks::TaskRef;

struct TaskRecord {
    task: TaskRef,
    info: TaskInfo,
    cancel: Option<CancellationToken>,
    join: Option<JoinHandle<()>>,
}

struct WorkerState {
    status: WorkerStatus,
    tasks: HashMap<String, TaskRecord>,
    /// Registration order, for stable snapshots.
    order: Vec<String>,
}

/// Bounded, lifecycle-managed set of tasks.
pub struct Worker {
    cfg: WorkerConfig,
    bus: Bus,
    state: RwLock<WorkerState>,
    /// Halts the status monitor.
    stop_signal: CancellationToken,
    /// Cancelled once the worker reaches `Stopped` or `Failed`.
    done: CancellationToken,
}

/// What `stop` needs from a record, taken out under the lock.
struct StopTarget {
    name: String,
    task: TaskRef,
    cancel: Option<CancellationToken>,
    join: Option<JoinHandle<()>>,
}

impl Worker {
    /// Creates an idle worker.
    ///
    /// Fails with [`RuntimeError::Init`] when `max_tasks` or `shutdown_timeout` is zero.
    pub fn new(cfg: WorkerConfig, bus: Bus) -> Result<Arc<Self>, RuntimeError> {
        if cfg.max_tasks == 0 {
            return Err(RuntimeError::Init("max_tasks must be greater than zero".into()));
        }
        if cfg.shutdown_timeout.is_zero() {
            return Err(RuntimeError::Init(
                "shutdown_timeout must be greater than zero".into(),
            ));
        }
        Ok(Arc::new(Self {
            cfg,
            bus,
            state: RwLock::new(WorkerState {
                status: WorkerStatus::Idle,
                tasks: HashMap::new(),
                order: Vec::new(),
            }),
            stop_signal: CancellationToken::new(),
            done: CancellationToken::new(),
        }))
    }

    /// Adds a task to an idle worker.
    pub async fn register_task(&self, task: TaskRef) -> Result<(), RuntimeError> {
        let name = task.name().to_string();
        let mut st = self.state.write().await;

        if st.status != WorkerStatus::Idle {
            return Err(RuntimeError::Registration(format!(
                "cannot register task '{name}': worker is not idle, current status: {}",
                st.status
            )));
        }
        if name.is_empty() {
            return Err(RuntimeError::Registration("task name is empty".into()));
        }
        if st.tasks.contains_key(&name) {
            return Err(RuntimeError::Registration(format!(
                "task '{name}' is already registered"
            )));
        }
        if st.tasks.len() >= self.cfg.max_tasks {
            return Err(RuntimeError::Registration(format!(
                "cannot register task '{name}': capacity of {} tasks reached",
                self.cfg.max_tasks
            )));
        }

        st.order.push(name.clone());
        st.tasks.insert(
            name.clone(),
            TaskRecord {
                task,
                info: TaskInfo::pending(name.clone()),
                cancel: None,
                join: None,
            },
        );
        drop(st);

        self.bus
            .publish(Event::new(EventKind::TaskRegistered).with_task(name));
        Ok(())
    }

    /// Launches every registered task under `ctx`.
    ///
    /// Each task gets a child token of `ctx`; cancelling `ctx` cancels them all.
    pub async fn start(self: &Arc<Self>, ctx: &CancellationToken) -> Result<(), RuntimeError> {
        let mut st = self.state.write().await;

        if st.status != WorkerStatus::Idle {
            return Err(RuntimeError::Start(format!(
                "worker is not idle, current status: {}",
                st.status
            )));
        }
        if st.tasks.is_empty() {
            return Err(RuntimeError::Start("no tasks registered".into()));
        }

        st.status = WorkerStatus::Starting;
        self.bus.publish(
            Event::new(EventKind::WorkerStarting).with_counts(TaskCounts {
                total: st.tasks.len(),
                ..TaskCounts::default()
            }),
        );

        let order = st.order.clone();
        let mut launched: Vec<String> = Vec::with_capacity(order.len());
        for name in &order {
            let Some(rec) = st.tasks.get_mut(name) else {
                continue;
            };
            match self.launch(name, rec, ctx) {
                Ok(()) => launched.push(name.clone()),
                Err(reason) => {
                    self.rollback(&mut st, &launched);
                    st.status = WorkerStatus::Failed;
                    drop(st);

                    self.done.cancel();
                    self.bus.publish(
                        Event::new(EventKind::WorkerStartFailed)
                            .with_task(name.clone())
                            .with_reason(reason.clone()),
                    );
                    return Err(RuntimeError::Start(format!(
                        "failed to launch task '{name}': {reason}"
                    )));
                }
            }
        }

        st.status = WorkerStatus::Running;
        let counts = TaskCounts::tally(st.tasks.values().map(|r| &r.info));
        drop(st);

        self.spawn_monitor(ctx);
        self.bus
            .publish(Event::new(EventKind::WorkerStarted).with_counts(counts));
        Ok(())
    }

    fn launch(
        self: &Arc<Self>,
        name: &str,
        rec: &mut TaskRecord,
        ctx: &CancellationToken,
    ) -> Result<(), String> {
        let handle = Handle::try_current().map_err(|e| e.to_string())?;

        let token = ctx.child_token();
        rec.info.status = TaskStatus::Running;
        rec.info.started_at = Some(SystemTime::now());
        rec.cancel = Some(token.clone());

        self.bus
            .publish(Event::new(EventKind::TaskStarting).with_task(name.to_string()));

        let me = Arc::clone(self);
        let task = Arc::clone(&rec.task);
        let name = name.to_string();
        rec.join = Some(handle.spawn(async move {
            let res = me.run_task(&name, &task, token).await;
            me.finish_task(&name, res).await;
        }));
        Ok(())
    }

    /// Cancels and aborts tasks launched before a failed start.
    fn rollback(&self, st: &mut WorkerState, launched: &[String]) {
        for name in launched {
            if let Some(rec) = st.tasks.get_mut(name) {
                if let Some(token) = rec.cancel.take() {
                    token.cancel();
                }
                if let Some(join) = rec.join.take() {
                    join.abort();
                }
                rec.info.status = TaskStatus::Stopped;
                rec.info.stopped_at = Some(SystemTime::now());
            }
        }
    }

    async fn run_task(
        &self,
        name: &str,
        task: &TaskRef,
        token: CancellationToken,
    ) -> Result<(), TaskError> {
        let run = AssertUnwindSafe(task.run(token.clone())).catch_unwind();

        let outcome = match self.cfg.task_deadline() {
            None => run.await,
            Some(timeout) => match time::timeout(timeout, run).await {
                Ok(outcome) => outcome,
                Err(_elapsed) => {
                    token.cancel();
                    self.bus.publish(
                        Event::new(EventKind::TaskTimeoutHit)
                            .with_task(name.to_string())
                            .with_timeout(timeout),
                    );
                    return Err(TaskError::Timeout { timeout });
                }
            },
        };

        outcome.unwrap_or_else(|panic| {
            Err(TaskError::execution(format!(
                "task panicked: {}",
                panic_message(panic.as_ref())
            )))
        })
    }

    async fn finish_task(self: &Arc<Self>, name: &str, res: Result<(), TaskError>) {
        let mut st = self.state.write().await;
        let Some(rec) = st.tasks.get_mut(name) else {
            return;
        };
        rec.info.stopped_at = Some(SystemTime::now());

        let failed = match res {
            Ok(()) => {
                rec.info.status = if rec.info.status == TaskStatus::Stopping {
                    TaskStatus::Stopped
                } else {
                    TaskStatus::Completed
                };
                self.bus
                    .publish(Event::new(EventKind::TaskCompleted).with_task(name.to_string()));
                false
            }
            Err(TaskError::Canceled) => {
                if rec.info.status != TaskStatus::Failed {
                    rec.info.status = TaskStatus::Stopped;
                }
                self.bus
                    .publish(Event::new(EventKind::TaskStopped).with_task(name.to_string()));
                false
            }
            Err(err) => {
                rec.info.status = TaskStatus::Failed;
                self.bus.publish(
                    Event::new(EventKind::TaskFailed)
                        .with_task(name.to_string())
                        .with_reason(err.to_string()),
                );
                rec.info.error = Some(err);
                true
            }
        };
        let running = st.status == WorkerStatus::Running;
        drop(st);

        if failed && running && self.cfg.stop_on_error {
            let me = Arc::clone(self);
            tokio::spawn(async move {
                // Another stop may already be under way.
                let _ = me.stop(&CancellationToken::new()).await;
            });
        }
    }

    fn spawn_monitor(self: &Arc<Self>, ctx: &CancellationToken) {
        let period = self.cfg.status_interval;
        if period.is_zero() {
            return;
        }
        let me = Arc::clone(self);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = me.stop_signal.cancelled() => break,
                    _ = ctx.cancelled() => break,
                    _ = ticker.tick() => {
                        let counts = {
                            let st = me.state.read().await;
                            TaskCounts::tally(st.tasks.values().map(|r| &r.info))
                        };
                        me.bus.publish(Event::new(EventKind::TasksSummary).with_counts(counts));
                    }
                }
            }
        });
    }

    /// Stops a running worker within `shutdown_timeout`.
    ///
    /// Every task is cancelled and its stop hook invoked concurrently. Tasks that
    /// have not exited when the deadline fires are aborted and marked failed with
    /// [`TaskError::ShutdownTimeout`]. Timeouts are reported through events and
    /// task snapshots, never as an error from this call.
    ///
    /// `ctx` bounds the whole operation: cancelling it fires the deadline early.
    pub async fn stop(&self, ctx: &CancellationToken) -> Result<(), RuntimeError> {
        let targets: Vec<StopTarget> = {
            let mut st = self.state.write().await;
            if st.status != WorkerStatus::Running {
                return Err(RuntimeError::Stop(format!(
                    "worker is not running, current status: {}",
                    st.status
                )));
            }
            st.status = WorkerStatus::Stopping;

            let order = st.order.clone();
            order
                .into_iter()
                .filter_map(|name| {
                    let rec = st.tasks.get_mut(&name)?;
                    if !rec.info.status.is_terminal() {
                        rec.info.status = TaskStatus::Stopping;
                        self.bus
                            .publish(Event::new(EventKind::TaskStopping).with_task(name.clone()));
                    }
                    Some(StopTarget {
                        task: Arc::clone(&rec.task),
                        cancel: rec.cancel.take(),
                        join: rec.join.take(),
                        name,
                    })
                })
                .collect()
        };

        let grace = self.cfg.shutdown_timeout;
        self.bus
            .publish(Event::new(EventKind::WorkerStopping).with_timeout(grace));

        let deadline = deadline_token(ctx, grace);
        self.stop_signal.cancel();

        // Every per-task race ends at the deadline, so the fan-out is bounded by it.
        join_all(targets.into_iter().map(|t| self.stop_task(t, &deadline))).await;

        let stuck = self.stuck_tasks().await;
        if stuck.is_empty() {
            self.bus.publish(Event::new(EventKind::AllStoppedWithin));
        } else {
            self.bus.publish(
                Event::new(EventKind::GraceExceeded)
                    .with_timeout(grace)
                    .with_reason(stuck.join(", ")),
            );
        }
        deadline.cancel();

        self.state.write().await.status = WorkerStatus::Stopped;
        self.bus.publish(Event::new(EventKind::WorkerStopped));
        self.done.cancel();
        Ok(())
    }

    async fn stop_task(&self, target: StopTarget, deadline: &CancellationToken) {
        let StopTarget {
            name,
            task,
            cancel,
            join,
        } = target;

        if let Some(token) = cancel {
            token.cancel();
        }

        let hook = tokio::select! {
            biased;
            res = task.stop(deadline.clone()) => Some(res),
            _ = deadline.cancelled() => None,
        };
        match hook {
            Some(Ok(())) => {}
            Some(Err(err)) => self.bus.publish(
                Event::new(EventKind::TaskStopHookFailed)
                    .with_task(name.clone())
                    .with_reason(err.to_string()),
            ),
            None => self.mark_stop_timeout(&name).await,
        }

        let Some(mut join) = join else {
            return;
        };
        let joined = tokio::select! {
            biased;
            res = &mut join => Some(res),
            _ = deadline.cancelled() => None,
        };

        let mut st = self.state.write().await;
        let Some(rec) = st.tasks.get_mut(&name) else {
            return;
        };
        match joined {
            Some(Ok(())) => {
                if rec.info.status == TaskStatus::Stopping {
                    rec.info.status = TaskStatus::Stopped;
                    rec.info.stopped_at = Some(SystemTime::now());
                }
            }
            Some(Err(err)) if err.is_panic() => {
                rec.info.status = TaskStatus::Failed;
                rec.info.stopped_at = Some(SystemTime::now());
                rec.info.error = Some(TaskError::execution(format!(
                    "task panicked: {}",
                    panic_message(err.into_panic().as_ref())
                )));
            }
            Some(Err(_cancelled)) => {
                if rec.info.status == TaskStatus::Stopping {
                    rec.info.status = TaskStatus::Stopped;
                    rec.info.stopped_at = Some(SystemTime::now());
                }
            }
            None => {
                join.abort();
                drop(st);
                self.mark_stop_timeout(&name).await;
            }
        }
    }

    async fn mark_stop_timeout(&self, name: &str) {
        let grace = self.cfg.shutdown_timeout;
        let mut st = self.state.write().await;
        let Some(rec) = st.tasks.get_mut(name) else {
            return;
        };
        if matches!(rec.info.error, Some(TaskError::ShutdownTimeout { .. })) {
            return;
        }
        rec.info.status = TaskStatus::Failed;
        rec.info.stopped_at = Some(SystemTime::now());
        rec.info.error = Some(TaskError::ShutdownTimeout { grace });
        drop(st);

        self.bus.publish(
            Event::new(EventKind::TaskStopTimeout)
                .with_task(name.to_string())
                .with_timeout(grace),
        );
    }

    async fn stuck_tasks(&self) -> Vec<String> {
        let st = self.state.read().await;
        st.order
            .iter()
            .filter(|name| {
                st.tasks.get(*name).is_some_and(|rec| {
                    matches!(rec.info.error, Some(TaskError::ShutdownTimeout { .. }))
                })
            })
            .cloned()
            .collect()
    }

    /// Returns the current worker status.
    pub async fn status(&self) -> WorkerStatus {
        self.state.read().await.status
    }

    /// Returns a snapshot of every task, in registration order.
    pub async fn tasks_info(&self) -> Vec<TaskInfo> {
        let st = self.state.read().await;
        st.order
            .iter()
            .filter_map(|name| st.tasks.get(name).map(|rec| rec.info.clone()))
            .collect()
    }

    /// Returns the snapshot of one task.
    pub async fn task_info(&self, name: &str) -> Option<TaskInfo> {
        self.state
            .read()
            .await
            .tasks
            .get(name)
            .map(|rec| rec.info.clone())
    }

    /// Returns per-status task counters.
    pub async fn counts(&self) -> TaskCounts {
        let st = self.state.read().await;
        TaskCounts::tally(st.tasks.values().map(|r| &r.info))
    }

    /// Resolves once the worker has stopped or failed to start.
    pub async fn wait(&self) {
        self.done.cancelled().await;
    }
}
