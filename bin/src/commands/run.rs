//! One-shot detection command.

use crate::app::App;
use crate::config::KeywatchConfig;
use anyhow::{Context, Result, bail};
use keywatch_detect::AuthorizationState;
use std::time::Duration;

/// Execute the run command.
pub(crate) async fn run(config: KeywatchConfig, budget: Option<u64>) -> Result<()> {
    let app = App::build(&config)?;
    if app.service.authorization_state() != AuthorizationState::Authorized {
        bail!("Exposure notifications are not authorized; set platform.authorized in keywatch.toml");
    }
    app.service.notify_radio_off_if_needed();
    let budget = budget.map_or_else(|| config.detection.execution_budget(), Duration::from_secs);

    let (cancel, timer) = super::deadline(budget);
    let result = app.service.orchestrator().detect_exposures(&cancel).await;
    timer.abort();

    let outcome = result.context("Exposure detection failed")?;

    println!("Processed archives: {}", outcome.processed_file_count);
    println!("New exposures: {}", outcome.new_exposures.len());
    if let Some(summary) = &outcome.summary {
        println!(
            "Summary: {} matched keys, maximum risk score {}",
            summary.matched_key_count, summary.maximum_risk_score
        );
    }
    for exposure in &outcome.new_exposures {
        println!(
            "  {} {} risk {} ({} min)",
            exposure.id,
            exposure.date.format("%Y-%m-%d"),
            exposure.total_risk_score,
            exposure.duration.as_secs() / 60
        );
    }

    Ok(())
}
