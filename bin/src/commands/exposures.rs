//! Exposure listing command.

use crate::app::App;
use crate::config::KeywatchConfig;
use anyhow::{Context, Result};

/// Execute the exposures command.
pub(crate) fn exposures(config: KeywatchConfig) -> Result<()> {
    let app = App::build(&config)?;
    let json = app
        .service
        .current_exposures_json()
        .context("Failed to read exposures")?;
    println!("{json}");
    Ok(())
}
