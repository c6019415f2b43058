//! Long-running service that executes scheduled detection passes.

use crate::app::App;
use crate::config::KeywatchConfig;
use anyhow::{Context, Result};
use chrono::Utc;
use tokio::signal::ctrl_c;
use tracing::{debug, info};

/// Execute the daemon command.
///
/// Starts the exposure service, then waits for each scheduled task request,
/// sleeps until its earliest begin time and runs it under the configured
/// execution budget. Ctrl-C cancels an in-flight run and stops the service.
pub(crate) async fn daemon(config: KeywatchConfig) -> Result<()> {
    let App {
        service,
        scheduler,
        mut requests,
    } = App::build(&config)?;
    let budget = config.detection.execution_budget();

    service
        .start()
        .await
        .context("Failed to start exposure service")?;
    info!(
        authorization = %service.authorization_state(),
        enabled = %service.enabled_state(),
        "daemon running"
    );

    loop {
        let request = tokio::select! {
            request = requests.recv() => request,
            _ = ctrl_c() => break,
        };
        let Some(request) = request else { break };
        if !scheduler.is_registered(&request.identifier) {
            debug!(task = %request.identifier, "dropping request for deregistered task");
            continue;
        }

        if let Some(begin) = request.earliest_begin {
            let delay = (begin - Utc::now()).to_std().unwrap_or_default();
            debug!(?delay, "waiting for next background run");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = ctrl_c() => break,
            }
        }

        let (cancel, timer) = super::deadline(budget);
        let task = service.handle_background_task(cancel.clone());
        tokio::pin!(task);
        let mut interrupted = false;
        let succeeded = tokio::select! {
            succeeded = &mut task => succeeded,
            _ = ctrl_c() => {
                interrupted = true;
                cancel.cancel();
                task.await
            }
        };
        timer.abort();
        info!(succeeded, "background run finished");

        if interrupted {
            break;
        }
    }

    info!("shutting down");
    service.stop();
    Ok(())
}
