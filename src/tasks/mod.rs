//! # Task abstractions.
//!
//! This module provides the task-related types:
//! - [`Task`] - trait for async, cancelable tasks with a stop hook
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn Task>`)
//! - [`BaseTask`] - idles until cancelled
//! - [`TickerTask`] - runs a handler on a fixed interval
//! - [`OnceTask`] - runs a handler exactly once

mod base;
mod once;
mod task;
mod ticker;

pub use base::BaseTask;
pub use once::OnceTask;
pub use task::{Task, TaskRef};
pub use ticker::TickerTask;
