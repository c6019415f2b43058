//! User state reset command.

use crate::app::App;
use crate::config::KeywatchConfig;
use anyhow::{Context, Result, bail};

/// Execute the reset command.
pub(crate) fn reset(config: KeywatchConfig, yes: bool) -> Result<()> {
    if !yes {
        bail!("Resetting clears the quota and resume cursor; pass --yes to confirm");
    }

    let app = App::build(&config)?;
    let state = app
        .service
        .reset_user_state()
        .context("Failed to reset user state")?;

    println!(
        "User state reset. Remaining daily capacity: {}",
        state.remaining_daily_file_processing_capacity
    );
    Ok(())
}
