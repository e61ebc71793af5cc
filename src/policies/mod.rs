//! Restart and backoff policies.
//!
//! This module groups the knobs that control **if** a worker is restarted
//! and **how long** to wait between attempts.
//!
//! ## Contents
//! - [`RestartPolicy`] whether/how often the runner replaces an exited worker
//! - [`BackoffPolicy`] how delays evolve (first / factor / max)
//!
//! ## Quick wiring
//! ```text
//! RunnerConfig { restart: RestartPolicy, .. }
//!      └─► core::runner uses:
//!           - restart.permits(count) to decide restart vs shutdown
//!           - restart.delay_for(count - 1) to schedule the next worker
//! ```

mod backoff;
mod restart;

pub use backoff::BackoffPolicy;
pub use restart::RestartPolicy;
