//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is the logging sink handed to every [`Worker`](crate::Worker) and
//! [`Runner`](crate::Runner) at construction. It wraps [`tokio::sync::broadcast`]
//! so publishing never blocks the code that reports.
//!
//! ```text
//! Publishers (many):                     Consumers:
//!   Worker (tasks, monitor) ──┐
//!   Worker::stop fan-out ─────┼──► Bus ──► SubscriberSet::listen ──► LogWriter, ...
//!   Runner (control loop) ────┘       └──► tests / embedders via Bus::subscribe
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` calls `broadcast::Sender::send` and returns.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if nobody is subscribed at send time.

use tokio::sync::broadcast;

use super::event::Event;

/// Default ring buffer size used by [`Bus::default`].
const DEFAULT_CAPACITY: usize = 1024;

/// Broadcast channel for runtime events.
///
/// Cheap to clone; all clones publish into the same channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// If there are no receivers, the event is dropped.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
