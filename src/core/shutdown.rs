//! # OS signal bridge.
//!
//! [`OsSignals`] forwards process signals to the runner's control queues.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` / `SIGTERM` → shutdown
//! - `SIGUSR1` → restart
//! - `SIGHUP` → reload
//!
//! **Other platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`] → shutdown

use std::io;

use tokio_util::sync::CancellationToken;

use crate::core::control::{ControlHandle, SignalSource};
#[cfg(unix)]
use crate::core::control::ControlSignal;

/// Signal source backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSignals;

#[cfg(unix)]
impl SignalSource for OsSignals {
    fn install(self: Box<Self>, signals: ControlHandle, token: CancellationToken) -> io::Result<()> {
        use tokio::signal::unix::{SignalKind, signal};

        // Registered eagerly so failures surface from `install`.
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigusr1 = signal(SignalKind::user_defined1())?;
        let mut sighup = signal(SignalKind::hangup())?;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = sigint.recv()  => { signals.deliver("SIGINT", ControlSignal::Shutdown); }
                    _ = sigterm.recv() => { signals.deliver("SIGTERM", ControlSignal::Shutdown); }
                    _ = sigusr1.recv() => { signals.deliver("SIGUSR1", ControlSignal::Restart); }
                    _ = sighup.recv()  => { signals.deliver("SIGHUP", ControlSignal::Reload); }
                }
            }
        });
        Ok(())
    }
}

#[cfg(not(unix))]
impl SignalSource for OsSignals {
    fn install(self: Box<Self>, signals: ControlHandle, token: CancellationToken) -> io::Result<()> {
        use crate::core::control::ControlSignal;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    res = tokio::signal::ctrl_c() => {
                        if res.is_err() {
                            break;
                        }
                        signals.deliver("ctrl-c", ControlSignal::Shutdown);
                    }
                }
            }
        });
        Ok(())
    }
}
