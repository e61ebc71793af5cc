//! # Task abstraction.
//!
//! This module defines the [`Task`] trait (async, cancelable, with a cooperative stop hook).
//! The common handle type is [`TaskRef`], an `Arc<dyn Task>` suitable for sharing across the runtime.
//!
//! A task receives a [`CancellationToken`] and must return promptly once it is cancelled,
//! otherwise it holds up worker shutdown until the shutdown deadline.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Shared handle to a task object.
pub type TaskRef = Arc<dyn Task>;

/// # Asynchronous, cancelable unit of work.
///
/// ### Contract
/// - [`name`](Task::name) is stable and non-empty; it is the task's key inside a worker.
/// - [`run`](Task::run) returns when its own work is done or when `ctx` is cancelled.
///   On cancellation it returns [`TaskError::Canceled`]; any other error marks the task failed.
/// - [`stop`](Task::stop) is called by worker shutdown **in addition to** cancelling `run`'s
///   token. Its `ctx` is cancelled when the shutdown deadline fires. The default is a no-op.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use async_trait::async_trait;
/// use agentvisor::{Task, TaskError};
///
/// struct Uploader;
///
/// #[async_trait]
/// impl Task for Uploader {
///     fn name(&self) -> &str { "uploader" }
///
///     async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
///         ctx.cancelled().await;
///         Err(TaskError::Canceled)
///     }
///
///     async fn stop(&self, _ctx: CancellationToken) -> Result<(), TaskError> {
///         // flush buffers, close connections...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// Executes the task until completion or cancellation.
    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError>;

    /// Best-effort stop hook, invoked alongside cancellation during shutdown.
    async fn stop(&self, _ctx: CancellationToken) -> Result<(), TaskError> {
        Ok(())
    }
}
