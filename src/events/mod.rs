//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Worker` (registration, task outcomes, stop race, summaries),
//!   `Runner` (signals, restarts, start/stop), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `SubscriberSet::listen` (fans out to subscribers such as `LogWriter`).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
