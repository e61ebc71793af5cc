//! # Periodic task (`TickerTask`)
//!
//! [`TickerTask`] invokes a handler on a fixed interval until cancelled. The first
//! tick fires one interval after `run` starts. A failing handler ends the run with
//! [`TaskError::Execution`]; the task does not retry on its own. Restarting is
//! the runner's decision.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use agentvisor::{TaskError, TaskRef, TickerTask};
//!
//! let t: TaskRef = TickerTask::arc("health-check", Duration::from_secs(30), |_ctx: CancellationToken| async {
//!     // check dependencies...
//!     Ok::<_, TaskError>(())
//! });
//! assert_eq!(t.name(), "health-check");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::task::Task;

/// Handler-on-interval task.
pub struct TickerTask<F> {
    name: Cow<'static, str>,
    interval: Duration,
    handler: F,
}

impl<F> TickerTask<F> {
    /// Creates a new ticker task.
    ///
    /// A zero interval is bumped to 1ms.
    pub fn new(name: impl Into<Cow<'static, str>>, interval: Duration, handler: F) -> Self {
        Self {
            name: name.into(),
            interval: interval.max(Duration::from_millis(1)),
            handler,
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, interval: Duration, handler: F) -> Arc<Self> {
        Arc::new(Self::new(name, interval, handler))
    }

    /// Returns the tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl<F, Fut> Task for TickerTask<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ctx.cancelled() => return Err(TaskError::Canceled),
                _ = ticker.tick() => {
                    match (self.handler)(ctx.clone()).await {
                        Ok(()) => {}
                        Err(TaskError::Canceled) => return Err(TaskError::Canceled),
                        Err(e) => {
                            return Err(TaskError::execution(format!(
                                "ticker task '{}' failed: {e}",
                                self.name
                            )));
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn ticks_until_cancelled() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let task = TickerTask::new("tick", Duration::from_millis(5), move |_ctx: CancellationToken| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), TaskError>(())
            }
        });

        let ctx = CancellationToken::new();
        let stopper = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            stopper.cancel();
        });

        assert_eq!(task.run(ctx).await, Err(TaskError::Canceled));
        assert!(hits.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn handler_failure_ends_run() {
        let task = TickerTask::new("flaky", Duration::from_millis(5), |_ctx: CancellationToken| async {
            Err::<(), _>(TaskError::execution("disk full"))
        });

        let err = task
            .run(CancellationToken::new())
            .await
            .expect_err("handler failure must end the run");
        assert_eq!(
            err,
            TaskError::execution("ticker task 'flaky' failed: task execution error: disk full")
        );
    }

    #[test]
    fn zero_interval_is_raised_to_one_millisecond() {
        let handler = |_ctx: CancellationToken| async { Ok::<(), TaskError>(()) };
        assert_eq!(
            TickerTask::new("zero", Duration::ZERO, handler).interval(),
            Duration::from_millis(1)
        );
        assert_eq!(
            TickerTask::new("steady", Duration::from_secs(5), handler).interval(),
            Duration::from_secs(5)
        );
    }

    #[tokio::test]
    async fn first_tick_waits_one_interval() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let task = TickerTask::new("slow", Duration::from_secs(60), move |_ctx: CancellationToken| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), TaskError>(())
            }
        });

        let ctx = CancellationToken::new();
        ctx.cancel();
        assert_eq!(task.run(ctx).await, Err(TaskError::Canceled));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
