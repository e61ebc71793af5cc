//! # Base task: blocks until cancelled.
//!
//! [`BaseTask`] is the simplest valid [`Task`]: it does nothing, waits for its
//! context to be cancelled and then reports [`TaskError::Canceled`]. Custom tasks
//! can delegate to [`BaseTask::until_cancelled`] for the same default body.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::task::Task;

/// Task that idles until its context is cancelled.
#[derive(Debug, Clone)]
pub struct BaseTask {
    name: Cow<'static, str>,
}

impl BaseTask {
    /// Creates a new base task.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self { name: name.into() }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    /// Default task body: waits for cancellation, then returns `Canceled`.
    pub async fn until_cancelled(ctx: &CancellationToken) -> Result<(), TaskError> {
        ctx.cancelled().await;
        Err(TaskError::Canceled)
    }
}

#[async_trait]
impl Task for BaseTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        Self::until_cancelled(&ctx).await
    }
}
