//! # Runner control signals.
//!
//! Three single-slot queues (shutdown, restart, reload) connect signal sources
//! and the public [`Runner`](crate::Runner) API to the runner's control loop.
//!
//! ```text
//!   SignalSource ──┐
//!                  ├─► ControlHandle ── try_send ──► [cap 1] ──► control loop
//!   Runner API  ───┘
//! ```
//!
//! ## Rules
//! - Each queue holds at most one pending request.
//! - A request posted while one is already pending is dropped (coalesced).
//! - Restart requests also stay gated while a restart is in flight, until the
//!   control loop calls [`ControlHandle::restart_finished`].

use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};

/// Kind of control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Stop the runner gracefully.
    Shutdown,
    /// Replace the current worker.
    Restart,
    /// Configuration reload hook.
    Reload,
}

impl fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ControlSignal::Shutdown => "shutdown",
            ControlSignal::Restart => "restart",
            ControlSignal::Reload => "reload",
        })
    }
}

/// Sending side of the control queues.
#[derive(Clone)]
pub struct ControlHandle {
    shutdown: mpsc::Sender<()>,
    restart: mpsc::Sender<()>,
    reload: mpsc::Sender<()>,
    /// Set from a posted restart until its cycle finishes.
    restart_pending: Arc<AtomicBool>,
    bus: Bus,
}

/// Receiving side of the control queues, owned by the control loop.
pub(crate) struct ControlReceivers {
    pub(crate) shutdown: mpsc::Receiver<()>,
    pub(crate) restart: mpsc::Receiver<()>,
    pub(crate) reload: mpsc::Receiver<()>,
}

/// Creates the three capacity-1 control queues.
pub(crate) fn control_channels(bus: Bus) -> (ControlHandle, ControlReceivers) {
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let (restart_tx, restart_rx) = mpsc::channel(1);
    let (reload_tx, reload_rx) = mpsc::channel(1);
    (
        ControlHandle {
            shutdown: shutdown_tx,
            restart: restart_tx,
            reload: reload_tx,
            restart_pending: Arc::new(AtomicBool::new(false)),
            bus,
        },
        ControlReceivers {
            shutdown: shutdown_rx,
            restart: restart_rx,
            reload: reload_rx,
        },
    )
}

impl ControlHandle {
    /// Posts a request without blocking.
    ///
    /// Returns `false` when a request of the same kind is already pending
    /// or the control loop is gone. A restart is also refused while an
    /// earlier one is still being carried out.
    pub fn send(&self, signal: ControlSignal) -> bool {
        match signal {
            ControlSignal::Shutdown => self.shutdown.try_send(()).is_ok(),
            ControlSignal::Reload => self.reload.try_send(()).is_ok(),
            ControlSignal::Restart => {
                if self.restart_pending.swap(true, Ordering::SeqCst) {
                    return false;
                }
                if self.restart.try_send(()).is_err() {
                    self.restart_pending.store(false, Ordering::SeqCst);
                    return false;
                }
                true
            }
        }
    }

    /// Reopens the restart gate once a restart cycle has ended.
    pub(crate) fn restart_finished(&self) {
        self.restart_pending.store(false, Ordering::SeqCst);
    }

    /// Publishes `SignalReceived` for an external signal, then posts the request.
    pub fn deliver(&self, origin: &str, signal: ControlSignal) -> bool {
        self.bus.publish(
            Event::new(EventKind::SignalReceived).with_reason(format!("{origin} -> {signal}")),
        );
        self.send(signal)
    }
}

/// Source of external control signals.
///
/// `install` is called once by [`Runner::start`](crate::Runner::start). The
/// source should forward signals through `signals` until `token` is cancelled.
pub trait SignalSource: Send + 'static {
    /// Starts forwarding signals.
    fn install(self: Box<Self>, signals: ControlHandle, token: CancellationToken) -> io::Result<()>;
}

/// Signal source that never produces signals.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSignals;

impl SignalSource for NoSignals {
    fn install(self: Box<Self>, _signals: ControlHandle, _token: CancellationToken) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queues_coalesce_to_one_pending_request() {
        let (handle, mut rx) = control_channels(Bus::new(16));

        assert!(handle.send(ControlSignal::Restart));
        assert!(!handle.send(ControlSignal::Restart));
        assert!(handle.send(ControlSignal::Shutdown));

        assert_eq!(rx.restart.recv().await, Some(()));
        assert!(rx.restart.try_recv().is_err());
        // Dequeued but not finished: still gated.
        assert!(!handle.send(ControlSignal::Restart));
        handle.restart_finished();
        assert!(handle.send(ControlSignal::Restart));
        assert_eq!(rx.shutdown.recv().await, Some(()));
        assert!(rx.reload.try_recv().is_err());
    }

    #[tokio::test]
    async fn deliver_publishes_signal_event() {
        let bus = Bus::new(16);
        let mut events = bus.subscribe();
        let (handle, mut rx) = control_channels(bus);

        assert!(handle.deliver("SIGHUP", ControlSignal::Reload));
        let ev = events.recv().await.expect("event");
        assert_eq!(ev.kind, EventKind::SignalReceived);
        assert_eq!(ev.reason.as_deref(), Some("SIGHUP -> reload"));
        assert_eq!(rx.reload.recv().await, Some(()));
    }

    #[tokio::test]
    async fn send_fails_once_receivers_are_dropped() {
        let (handle, rx) = control_channels(Bus::new(16));
        drop(rx);
        assert!(!handle.send(ControlSignal::Shutdown));
        assert!(!handle.send(ControlSignal::Restart));
        assert!(!handle.restart_pending.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn clones_share_the_restart_gate() {
        let (handle, _rx) = control_channels(Bus::new(16));
        let signals = handle.clone();

        assert!(signals.deliver("SIGUSR1", ControlSignal::Restart));
        assert!(!handle.send(ControlSignal::Restart));
    }
}
