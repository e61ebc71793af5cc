//! Deadline tokens.
//!
//! A deadline token is a child of some parent token that is additionally
//! cancelled once a duration elapses. Shutdown code passes it to stop hooks
//! and races against it.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Returns a child of `parent` that is cancelled after `after`.
///
/// Cancel the returned token once it is no longer needed; that also ends the timer.
pub(crate) fn deadline_token(parent: &CancellationToken, after: Duration) -> CancellationToken {
    let token = parent.child_token();
    let timer = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = timer.cancelled() => {}
            _ = tokio::time::sleep(after) => timer.cancel(),
        }
    });
    token
}
