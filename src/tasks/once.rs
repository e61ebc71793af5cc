//! # Run-once task (`OnceTask`)
//!
//! [`OnceTask`] wraps a closure `F: Fn(CancellationToken) -> Fut` and invokes it
//! exactly once per `run`, returning its result. It ignores any ticking contract:
//! when the handler returns, the task is done.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use agentvisor::{OnceTask, TaskRef, TaskError};
//!
//! let t: TaskRef = OnceTask::arc("migrate", |ctx: CancellationToken| async move {
//!     if ctx.is_cancelled() {
//!         return Err(TaskError::Canceled);
//!     }
//!     // apply migrations...
//!     Ok::<_, TaskError>(())
//! });
//!
//! assert_eq!(t.name(), "migrate");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::task::Task;

/// Function-backed single-shot task.
#[derive(Debug)]
pub struct OnceTask<F> {
    name: Cow<'static, str>,
    handler: F,
}

impl<F> OnceTask<F> {
    /// Creates a new run-once task.
    ///
    /// Prefer [`OnceTask::arc`] when you immediately need a [`TaskRef`](crate::TaskRef).
    pub fn new(name: impl Into<Cow<'static, str>>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, handler: F) -> Arc<Self> {
        Arc::new(Self::new(name, handler))
    }
}

#[async_trait]
impl<F, Fut> Task for OnceTask<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        (self.handler)(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn invokes_handler_once_and_returns_its_result() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let task = OnceTask::new("once", move |_ctx: CancellationToken| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TaskError::execution("nope"))
            }
        });

        assert_eq!(
            task.run(CancellationToken::new()).await,
            Err(TaskError::execution("nope"))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
