//! Process wiring for the `agentvisor` binary.
//!
//! Builds the event pipeline (bus → [`LogWriter`]), the runner with OS signal
//! handling and the agent's built-in tasks, then blocks until the runner stops.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::loader::AppConfig;
use crate::error::{RuntimeError, TaskError};
use crate::events::Bus;
use crate::subscribers::{LogWriter, Subscribe, SubscriberSet};
use crate::tasks::{TaskRef, TickerTask};
use crate::{OsSignals, Runner, TaskFactory};

/// Interval of the `config-watcher` task.
pub const CONFIG_WATCH_INTERVAL: Duration = Duration::from_secs(5);
/// Interval of the `health-check` task.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Factory for the agent's built-in tasks.
pub fn agent_tasks() -> TaskFactory {
    Arc::new(|| {
        let config_watcher: TaskRef = TickerTask::arc(
            "config-watcher",
            CONFIG_WATCH_INTERVAL,
            |_ctx: CancellationToken| async {
                debug!(target: "agentvisor::tasks", "checking configuration for changes");
                Ok::<_, TaskError>(())
            },
        );
        let health_check: TaskRef = TickerTask::arc(
            "health-check",
            HEALTH_CHECK_INTERVAL,
            |_ctx: CancellationToken| async {
                debug!(target: "agentvisor::tasks", "performing health check");
                Ok::<_, TaskError>(())
            },
        );
        vec![config_watcher, health_check]
    })
}

/// Runs the agent until a shutdown signal or a terminal runner failure.
///
/// Returns [`ExitCode::FAILURE`] when shutdown exceeded its deadline.
pub async fn run(cfg: AppConfig) -> Result<ExitCode> {
    let bus = Bus::default();
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let set = Arc::new(SubscriberSet::new(subs, bus.clone()));
    let stop_listener = CancellationToken::new();
    let listener = set.listen(&bus, stop_listener.clone());

    let runner = Runner::builder(cfg.worker, cfg.runner, agent_tasks())
        .with_bus(bus)
        .with_signal_source(OsSignals)
        .build()
        .context("building runner")?;

    let started = runner.start().await.context("starting runner");
    if started.is_ok() {
        info!("agentvisor running; send SIGINT/SIGTERM to stop, SIGUSR1 to restart");
        runner.wait().await;
    }
    let last_error = runner.last_error().await;

    drain_events(set, listener, stop_listener).await;

    started?;
    match last_error {
        Some(err @ RuntimeError::GraceExceeded { .. }) => {
            error!(error = %err, "shutdown did not complete in time");
            Ok(ExitCode::FAILURE)
        }
        _ => {
            info!("agentvisor stopped");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Forwards every event already on the bus, then waits for subscribers to
/// finish their queues.
async fn drain_events(set: Arc<SubscriberSet>, listener: JoinHandle<()>, stop: CancellationToken) {
    stop.cancel();
    if let Err(e) = listener.await {
        warn!(error = %e, "event listener ended abnormally");
    }
    match Arc::try_unwrap(set) {
        Ok(set) => set.shutdown().await,
        Err(_) => warn!("subscriber set still shared; skipping drain"),
    }
}
