//! # Event subscribers for the agentvisor runtime.
//!
//! Subscribers are how the runtime's reports reach the outside world. The
//! [`Bus`](crate::Bus) is injected into each worker and runner; a
//! [`SubscriberSet`] listens to it and fans events out.
//!
//! ```text
//!   Worker / Runner ── publish(Event) ──► Bus ──► SubscriberSet::listen
//!                                                      │
//!                                            ┌─────────┼─────────┐
//!                                            ▼         ▼         ▼
//!                                        LogWriter  Metrics   Custom
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub(crate) use set::panic_message;
pub use subscriber::Subscribe;
