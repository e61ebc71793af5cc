//! # Runner: supervises one worker at a time.
//!
//! The [`Runner`] builds a [`Worker`] from a [`TaskFactory`], starts it, and
//! replaces it wholesale when it exits unexpectedly or a restart is requested.
//!
//! ```text
//!             ┌──────────── control loop ────────────┐
//!  signals ──►│ shutdown ─► tear down ─► Stopped     │
//!  restart()─►│ restart  ─► tear down ─► delay ─► new worker
//!  watch   ──►│ reload   ─► ReloadRequested          │
//!             └──────────────────────────────────────┘
//!                  ▲
//!                  └── watch task: worker.wait() resolved while Running
//! ```
//!
//! ## Rules
//! - At most one live worker; restart = fresh worker, never a resumed one.
//! - `restart_count` only grows. The delay before restart `k` (1-based) is
//!   `policy.delay_for(k - 1)`.
//! - A watch task is bound to one worker lifetime and is cancelled before any
//!   deliberate teardown, so planned stops never look like crashes.
//! - Restart requests coalesce: one queued, or one in flight, at a time.
//! - Worker teardown is bounded by `RunnerConfig::shutdown_timeout`.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::{RunnerConfig, WorkerConfig};
use crate::core::control::{
    ControlHandle, ControlReceivers, ControlSignal, NoSignals, SignalSource, control_channels,
};
use crate::core::deadline::deadline_token;
use crate::core::status::{RunnerInfo, RunnerStatus};
use crate::core::worker::Worker;
use crate::error::{RuntimeError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::tasks::TaskRef;

/// Produces the task set for each new worker.
pub type TaskFactory = Arc<dyn Fn() -> Vec<TaskRef> + Send + Sync>;

struct RunnerState {
    status: RunnerStatus,
    worker: Option<Arc<Worker>>,
    watch: Option<CancellationToken>,
    restart_count: u32,
    last_error: Option<RuntimeError>,
}

/// Restart supervisor around a single [`Worker`].
pub struct Runner {
    cfg: RunnerConfig,
    worker_cfg: WorkerConfig,
    factory: TaskFactory,
    bus: Bus,
    signals: Mutex<Option<Box<dyn SignalSource>>>,
    control: ControlHandle,
    receivers: Mutex<Option<ControlReceivers>>,
    state: RwLock<RunnerState>,
    /// Parent of every worker context, watch and signal bridge.
    root: CancellationToken,
    /// Cancelled once the control loop has finished.
    done: CancellationToken,
}

/// Builder for [`Runner`].
pub struct RunnerBuilder {
    worker_cfg: WorkerConfig,
    runner_cfg: RunnerConfig,
    factory: TaskFactory,
    bus: Option<Bus>,
    signals: Box<dyn SignalSource>,
}

impl RunnerBuilder {
    /// Uses `bus` for every event of the runner and its workers.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Installs `source` on [`Runner::start`]. Defaults to [`NoSignals`].
    pub fn with_signal_source(mut self, source: impl SignalSource) -> Self {
        self.signals = Box::new(source);
        self
    }

    /// Validates the configuration and builds an idle runner.
    pub fn build(self) -> Result<Arc<Runner>, RuntimeError> {
        if self.worker_cfg.max_tasks == 0 {
            return Err(RuntimeError::Init(
                "worker max_tasks must be greater than zero".into(),
            ));
        }
        if self.worker_cfg.shutdown_timeout.is_zero() {
            return Err(RuntimeError::Init(
                "worker shutdown_timeout must be greater than zero".into(),
            ));
        }
        if self.runner_cfg.shutdown_timeout.is_zero() {
            return Err(RuntimeError::Init(
                "runner shutdown_timeout must be greater than zero".into(),
            ));
        }

        let bus = self.bus.unwrap_or_default();
        let (control, receivers) = control_channels(bus.clone());
        Ok(Arc::new(Runner {
            cfg: self.runner_cfg,
            worker_cfg: self.worker_cfg,
            factory: self.factory,
            bus,
            signals: Mutex::new(Some(self.signals)),
            control,
            receivers: Mutex::new(Some(receivers)),
            state: RwLock::new(RunnerState {
                status: RunnerStatus::Idle,
                worker: None,
                watch: None,
                restart_count: 0,
                last_error: None,
            }),
            root: CancellationToken::new(),
            done: CancellationToken::new(),
        }))
    }
}

impl Runner {
    /// Starts building a runner.
    pub fn builder(
        worker_cfg: WorkerConfig,
        runner_cfg: RunnerConfig,
        factory: TaskFactory,
    ) -> RunnerBuilder {
        RunnerBuilder {
            worker_cfg,
            runner_cfg,
            factory,
            bus: None,
            signals: Box::new(NoSignals),
        }
    }

    /// Returns the bus this runner publishes to.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Returns a handle for posting control requests.
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    /// Installs the signal source, starts the first worker and the control loop.
    pub async fn start(self: &Arc<Self>) -> Result<(), RuntimeError> {
        {
            let mut st = self.state.write().await;
            if st.status != RunnerStatus::Idle {
                return Err(RuntimeError::Start(format!(
                    "runner is not idle, current status: {}",
                    st.status
                )));
            }
            st.status = RunnerStatus::Starting;
        }
        self.bus.publish(Event::new(EventKind::RunnerStarting));

        let Some(receivers) = self.receivers.lock().await.take() else {
            return self
                .fail_start(RuntimeError::Start("control loop already started".into()))
                .await;
        };

        if let Some(source) = self.signals.lock().await.take()
            && let Err(e) = source.install(self.control.clone(), self.root.child_token())
        {
            return self
                .fail_start(RuntimeError::Start(format!(
                    "installing signal handlers: {e}"
                )))
                .await;
        }

        let worker = match self.spawn_worker().await {
            Ok(worker) => worker,
            Err(e) => return self.fail_start(RuntimeError::Start(e.to_string())).await,
        };

        self.commit_worker(worker).await;

        let me = Arc::clone(self);
        tokio::spawn(async move { me.control_loop(receivers).await });

        self.bus.publish(Event::new(EventKind::RunnerStarted));
        Ok(())
    }

    async fn fail_start(&self, err: RuntimeError) -> Result<(), RuntimeError> {
        {
            let mut st = self.state.write().await;
            st.status = RunnerStatus::Failed;
            st.last_error = Some(err.clone());
        }
        self.root.cancel();
        self.done.cancel();
        self.bus
            .publish(Event::new(EventKind::RunnerStartFailed).with_reason(err.to_string()));
        Err(err)
    }

    /// Stops the control loop and tears down the current worker.
    ///
    /// Resolves once the runner is `Stopped`.
    pub async fn stop(&self) -> Result<(), RuntimeError> {
        {
            let mut st = self.state.write().await;
            if !matches!(st.status, RunnerStatus::Running | RunnerStatus::Restarting) {
                return Err(RuntimeError::Stop(format!(
                    "runner is not running, current status: {}",
                    st.status
                )));
            }
            st.status = RunnerStatus::Stopping;
        }
        self.bus.publish(Event::new(EventKind::RunnerStopping));

        self.root.cancel();
        self.control.send(ControlSignal::Shutdown);
        self.done.cancelled().await;

        self.state.write().await.status = RunnerStatus::Stopped;
        Ok(())
    }

    /// Requests a worker restart.
    ///
    /// Returns once the request is queued; the restart itself runs on the control loop.
    /// Fails while another restart, from any source, is queued or in flight.
    pub async fn restart(&self) -> Result<(), RuntimeError> {
        let status = self.status().await;
        if !matches!(status, RunnerStatus::Running | RunnerStatus::Restarting) {
            return Err(RuntimeError::Restart(format!(
                "runner is not running, current status: {status}"
            )));
        }
        if !self.control.send(ControlSignal::Restart) {
            return Err(RuntimeError::Restart("restart already in progress".into()));
        }
        Ok(())
    }

    /// Resolves once the control loop has finished.
    pub async fn wait(&self) {
        self.done.cancelled().await;
    }

    /// Returns the current runner status.
    pub async fn status(&self) -> RunnerStatus {
        self.state.read().await.status
    }

    /// Returns how many restarts have been attempted so far.
    pub async fn restart_count(&self) -> u32 {
        self.state.read().await.restart_count
    }

    /// Returns the last start, restart or shutdown failure.
    ///
    /// Cleared whenever a fresh worker comes up.
    pub async fn last_error(&self) -> Option<RuntimeError> {
        self.state.read().await.last_error.clone()
    }

    /// Returns a snapshot of the runner and its current worker.
    pub async fn info(&self) -> RunnerInfo {
        let (status, restart_count, last_error, worker) = {
            let st = self.state.read().await;
            (
                st.status,
                st.restart_count,
                st.last_error.clone(),
                st.worker.clone(),
            )
        };
        let (worker_status, worker_tasks) = match worker {
            Some(w) => (Some(w.status().await), w.tasks_info().await),
            None => (None, Vec::new()),
        };
        RunnerInfo {
            status,
            restart_count,
            worker_status,
            worker_tasks,
            last_error,
        }
    }

    async fn control_loop(self: Arc<Self>, mut rx: ControlReceivers) {
        loop {
            tokio::select! {
                _ = self.root.cancelled() => break,
                Some(()) = rx.shutdown.recv() => break,
                Some(()) = rx.restart.recv() => {
                    if let Err(err) = self.restart_worker().await {
                        let attempt = self.restart_count().await;
                        self.bus.publish(
                            Event::new(EventKind::RestartFailed)
                                .with_attempt(attempt)
                                .with_reason(err.to_string()),
                        );
                        if self.root.is_cancelled() || !self.cfg.restart.permits(attempt) {
                            break;
                        }
                        self.control.send(ControlSignal::Restart);
                    }
                }
                Some(()) = rx.reload.recv() => {
                    self.bus.publish(Event::new(EventKind::ReloadRequested));
                }
            }
        }
        self.finish().await;
    }

    async fn finish(&self) {
        let was_stopping = {
            let mut st = self.state.write().await;
            let was = st.status == RunnerStatus::Stopping;
            st.status = RunnerStatus::Stopping;
            was
        };
        if !was_stopping {
            self.bus.publish(Event::new(EventKind::RunnerStopping));
        }

        let stuck = self.shutdown_worker().await;
        {
            let mut st = self.state.write().await;
            st.status = RunnerStatus::Stopped;
            if !stuck.is_empty() {
                st.last_error = Some(RuntimeError::GraceExceeded {
                    grace: self
                        .worker_cfg
                        .shutdown_timeout
                        .min(self.cfg.shutdown_timeout),
                    stuck,
                });
            }
        }
        self.root.cancel();
        self.bus.publish(Event::new(EventKind::RunnerStopped));
        self.done.cancel();
    }

    /// Builds, fills and starts a fresh worker.
    async fn spawn_worker(&self) -> Result<Arc<Worker>, RuntimeError> {
        let worker = Worker::new(self.worker_cfg.clone(), self.bus.clone())
            .map_err(|e| RuntimeError::WorkerManage(format!("creating worker: {e}")))?;
        for task in (self.factory)() {
            let name = task.name().to_string();
            worker.register_task(task).await.map_err(|e| {
                RuntimeError::WorkerManage(format!("registering task '{name}': {e}"))
            })?;
        }
        worker
            .start(&self.root)
            .await
            .map_err(|e| RuntimeError::WorkerManage(format!("starting worker: {e}")))?;
        Ok(worker)
    }

    /// Makes `worker` current, marks the runner running and arms its watch.
    async fn commit_worker(self: &Arc<Self>, worker: Arc<Worker>) {
        let mut st = self.state.write().await;
        if matches!(st.status, RunnerStatus::Starting | RunnerStatus::Restarting) {
            st.status = RunnerStatus::Running;
        }
        st.last_error = None;
        self.control.restart_finished();

        let watch = self.root.child_token();
        st.watch = Some(watch.clone());
        st.worker = Some(Arc::clone(&worker));

        let me = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = watch.cancelled() => {}
                _ = worker.wait() => me.on_worker_exit().await,
            }
        });
    }

    async fn on_worker_exit(&self) {
        let (status, count) = {
            let st = self.state.read().await;
            (st.status, st.restart_count)
        };
        if status != RunnerStatus::Running {
            return;
        }
        self.bus
            .publish(Event::new(EventKind::WorkerExited).with_attempt(count));

        let policy = self.cfg.restart;
        if policy.permits(count) {
            self.control.send(ControlSignal::Restart);
        } else {
            if policy.enabled {
                self.bus
                    .publish(Event::new(EventKind::RestartsExhausted).with_attempt(count));
            }
            self.control.send(ControlSignal::Shutdown);
        }
    }

    /// Cancels the watch and stops the current worker within the runner's timeout.
    ///
    /// Returns the names of tasks that did not stop in time. The stopped worker
    /// stays attached for introspection until it is replaced.
    async fn shutdown_worker(&self) -> Vec<String> {
        let worker = {
            let mut st = self.state.write().await;
            if let Some(watch) = st.watch.take() {
                watch.cancel();
            }
            st.worker.clone()
        };
        let Some(worker) = worker else {
            return Vec::new();
        };

        let deadline = deadline_token(&CancellationToken::new(), self.cfg.shutdown_timeout);
        if worker.stop(&deadline).await.is_err() {
            // Already stopping on its own (stop_on_error) or never started.
            tokio::select! {
                _ = worker.wait() => {}
                _ = deadline.cancelled() => {}
            }
        }
        deadline.cancel();

        worker
            .tasks_info()
            .await
            .into_iter()
            .filter(|info| matches!(info.error, Some(TaskError::ShutdownTimeout { .. })))
            .map(|info| info.name)
            .collect()
    }

    async fn restart_worker(self: &Arc<Self>) -> Result<(), RuntimeError> {
        let attempt = {
            let mut st = self.state.write().await;
            if !matches!(st.status, RunnerStatus::Running | RunnerStatus::Restarting) {
                self.control.restart_finished();
                return Err(RuntimeError::Restart(format!(
                    "runner is not running, current status: {}",
                    st.status
                )));
            }
            st.restart_count = st.restart_count.saturating_add(1);
            st.status = RunnerStatus::Restarting;
            st.restart_count
        };
        let delay = self.cfg.restart.delay_for(attempt - 1);
        self.bus.publish(
            Event::new(EventKind::RestartScheduled)
                .with_attempt(attempt)
                .with_delay(delay),
        );

        self.shutdown_worker().await;

        if !delay.is_zero() {
            tokio::select! {
                _ = self.root.cancelled() => {
                    self.control.restart_finished();
                    return Err(RuntimeError::Restart("runner is stopping".into()));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        match self.spawn_worker().await {
            Ok(worker) => {
                self.commit_worker(worker).await;
                self.bus
                    .publish(Event::new(EventKind::RestartSucceeded).with_attempt(attempt));
                Ok(())
            }
            Err(e) => {
                let err = RuntimeError::Restart(format!("attempt {attempt}: {e}"));
                self.state.write().await.last_error = Some(err.clone());
                self.control.restart_finished();
                Err(err)
            }
        }
    }
}
