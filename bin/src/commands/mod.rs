//! CLI command implementations.

pub(crate) mod daemon;
pub(crate) mod exposures;
pub(crate) mod reset;
pub(crate) mod run;
pub(crate) mod status;

use keywatch_detect::CancellationToken;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Returns a token that is cancelled once `budget` has elapsed, and the timer
/// task driving it. Abort the task when the run finishes first.
pub(crate) fn deadline(budget: Duration) -> (CancellationToken, JoinHandle<()>) {
    let cancel = CancellationToken::new();
    let timer = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(budget).await;
            cancel.cancel();
        })
    };
    (cancel, timer)
}
