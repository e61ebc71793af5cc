//! # agentvisor
//!
//! **Agentvisor** is the supervised task engine of a long-running agent process.
//!
//! A [`Worker`] runs a bounded set of independently cancellable tasks through a
//! typed lifecycle. A [`Runner`] owns one worker at a time, restarts it when it
//! exits or when asked to, and shuts everything down within fixed deadlines.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  TickerTask  │   │   OnceTask   │   │  custom Task │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            └──────────────────┼──────────────────┘
//!                               ▼  TaskFactory (called per worker)
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Runner                                                           │
//! │  - control loop: shutdown / restart / reload queues (capacity 1)  │
//! │  - RestartPolicy: cap, delay, optional exponential backoff        │
//! │  - watch task: worker.wait() → restart or shutdown                │
//! │  - SignalSource: OsSignals (SIGINT/TERM/USR1/HUP) or NoSignals    │
//! └──────┬────────────────────────────────────────────────────┬───────┘
//!        ▼ one live worker                                    │
//! ┌──────────────────────────────────────────────┐            │
//! │  Worker                                      │            │
//! │  - task records (status, timestamps, error)  │            │
//! │  - per-task child tokens + join handles      │            │
//! │  - bounded stop race, TasksSummary monitor   │            │
//! └──────┬───────────────────────────────────────┘            │
//!        │ publishes                                          │ publishes
//!        ▼                                                    ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                            SubscriberSet::listen
//!                         ┌─────────┼─────────┐
//!                         ▼         ▼         ▼
//!                     LogWriter  metrics   custom
//! ```
//!
//! ### Lifecycle
//! ```text
//! Runner::start ──► Worker::new ──► register_task ×N ──► Worker::start(root)
//!
//! control loop {
//!   ├─ shutdown / root cancelled ─► Worker::stop (bounded) ─► Stopped
//!   ├─ restart ─► restart_count += 1
//!   │             ├─ Worker::stop (bounded)
//!   │             ├─ sleep(policy.delay_for(count - 1)) (cancellable)
//!   │             └─ fresh worker ─► Running
//!   │                  └─ on failure: retry while policy permits, else shut down
//!   └─ reload ─► ReloadRequested
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types / traits                         |
//! |-------------------|-------------------------------------------------------------|--------------------------------------------|
//! | **Tasks**         | Cancellable units of work with a stop hook.                 | [`Task`], [`TickerTask`], [`OnceTask`]     |
//! | **Worker**        | Bounded task pool, start/stop lifecycle, snapshots.         | [`Worker`], [`TaskInfo`]                   |
//! | **Supervision**   | Restart on exit or request, signal handling.                | [`Runner`], [`SignalSource`]               |
//! | **Policies**      | Restart cap, delay and backoff.                             | [`RestartPolicy`], [`BackoffPolicy`]       |
//! | **Subscriber API**| Hook into lifecycle events.                                 | [`Subscribe`], [`LogWriter`]               |
//! | **Errors**        | Typed errors for lifecycle calls and task execution.        | [`RuntimeError`], [`TaskError`]            |
//! | **Configuration** | Plain config structs plus a TOML loader.                    | [`WorkerConfig`], [`RunnerConfig`]         |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use agentvisor::{Runner, RunnerConfig, TaskError, TaskFactory, TaskRef, TickerTask, WorkerConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let factory: TaskFactory = Arc::new(|| {
//!         let heartbeat: TaskRef =
//!             TickerTask::arc("heartbeat", Duration::from_millis(10), |_ctx: CancellationToken| async {
//!                 Ok::<_, TaskError>(())
//!             });
//!         vec![heartbeat]
//!     });
//!
//!     let runner = Runner::builder(WorkerConfig::default(), RunnerConfig::default(), factory).build()?;
//!     runner.start().await?;
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//!     runner.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod cli;
pub mod config;
mod core;
mod error;
mod events;
pub mod logging;
mod policies;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use config::{RunnerConfig, WorkerConfig};
pub use crate::core::{
    ControlHandle, ControlSignal, NoSignals, OsSignals, Runner, RunnerBuilder, RunnerInfo,
    RunnerStatus, SignalSource, TaskCounts, TaskFactory, TaskInfo, TaskStatus, Worker,
    WorkerStatus,
};
pub use error::{RuntimeError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, RestartPolicy};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{BaseTask, OnceTask, Task, TaskRef, TickerTask};
