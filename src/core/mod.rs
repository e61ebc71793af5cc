//! Runtime core: worker, runner and their control plumbing.
//!
//! Internal modules:
//! - [`worker`]: bounded task pool with start/stop lifecycle and graceful shutdown;
//! - [`runner`]: supervises one worker, restarts it per policy, owns the control loop;
//! - [`control`]: single-slot control queues and the signal-source seam;
//! - [`shutdown`]: OS signal bridge;
//! - [`deadline`]: deadline tokens for bounded shutdown;
//! - [`status`]: lifecycle statuses and snapshots.

mod control;
mod deadline;
mod runner;
mod shutdown;
mod status;
mod worker;

pub use control::{ControlHandle, ControlSignal, NoSignals, SignalSource};
pub use runner::{Runner, RunnerBuilder, TaskFactory};
pub use shutdown::OsSignals;
pub use status::{RunnerInfo, RunnerStatus, TaskCounts, TaskInfo, TaskStatus, WorkerStatus};
pub use worker::Worker;
