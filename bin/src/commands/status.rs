//! Detection status command.

use crate::app::App;
use crate::config::KeywatchConfig;
use anyhow::{Context, Result};
use keywatch_detect::ServiceError;

/// Execute the status command.
pub(crate) fn status(config: KeywatchConfig) -> Result<()> {
    let app = App::build(&config)?;
    let service = &app.service;
    let store = service.orchestrator().store();
    let state = store.user_state().context("Failed to read user state")?;

    println!("Authorization: {}", service.authorization_state());
    println!("Exposure notifications: {}", service.enabled_state());

    match service.last_detection_date() {
        Ok(date) => println!("Last detection: {}", date.format("%Y-%m-%d %H:%M:%S UTC")),
        Err(ServiceError::DetectionNeverPerformed) => println!("Last detection: never"),
        Err(e) => return Err(e).context("Failed to read last detection date"),
    }

    println!(
        "Remaining daily capacity: {}/{}",
        state.remaining_daily_file_processing_capacity, config.detection.daily_file_capacity
    );
    println!(
        "Last processed archive: {}",
        if state.has_processed_archive() {
            state.last_processed_archive_path.as_str()
        } else {
            "none"
        }
    );
    if let Some(ref err) = state.last_detection_error_description {
        println!("Last error: {}", err);
    }

    println!("Stored exposures: {}", store.exposures()?.len());
    println!(
        "Detection summaries: {}",
        store.detection_summaries()?.len()
    );

    Ok(())
}
