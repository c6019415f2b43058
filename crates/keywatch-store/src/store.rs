//! The persisted-state contract used by the orchestrator.

use crate::{Result, StateChange};
use chrono::{DateTime, Utc};
use keywatch_types::{Exposure, ExposureDetectionSummary, UserState};
use tokio::sync::broadcast;

/// Read/write access to persisted detection state.
///
/// Implementations must provide read-after-write consistency within a
/// process, and must create the [`UserState`] on first read so that exactly
/// one record always exists.
pub trait StateStore: Send + Sync + std::fmt::Debug {
    /// Returns the user state, creating the default record if none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be read or created.
    fn user_state(&self) -> Result<UserState>;

    /// Replaces the stored user state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be written.
    fn save_user_state(&self, state: &UserState) -> Result<()>;

    /// Replaces the user state with a fresh default record.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be written.
    fn reset_user_state(&self) -> Result<UserState>;

    /// Returns every stored exposure, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the exposures cannot be read.
    fn exposures(&self) -> Result<Vec<Exposure>>;

    /// Appends exposures to the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the exposures cannot be written.
    fn append_exposures(&self, exposures: &[Exposure]) -> Result<()>;

    /// Returns every stored detection summary, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the summaries cannot be read.
    fn detection_summaries(&self) -> Result<Vec<ExposureDetectionSummary>>;

    /// Appends a detection summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the summary cannot be written.
    fn append_detection_summary(&self, summary: &ExposureDetectionSummary) -> Result<()>;

    /// Deletes summaries received before `cutoff`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the summaries cannot be rewritten.
    fn prune_detection_summaries(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    /// Commits the results of a detection run as one unit.
    ///
    /// Appends `exposures` and `summary`, prunes summaries received before
    /// `prune_cutoff` and replaces the user state. Either every change is
    /// stored or none is. Returns how many summaries were pruned.
    ///
    /// # Errors
    ///
    /// Returns an error if the changes cannot be written. Stored state is
    /// left as it was before the call.
    fn commit_run(
        &self,
        state: &UserState,
        exposures: &[Exposure],
        summary: Option<&ExposureDetectionSummary>,
        prune_cutoff: DateTime<Utc>,
    ) -> Result<usize>;

    /// Subscribes to state change events.
    fn subscribe(&self) -> broadcast::Receiver<StateChange>;

    /// Returns how many summaries are already stored for the given day.
    ///
    /// # Errors
    ///
    /// Returns an error if the summaries cannot be read.
    fn sequence_in_day(&self, start_of_day: DateTime<Utc>) -> Result<u32> {
        let count = self
            .detection_summaries()?
            .iter()
            .filter(|s| s.start_of_date_received == start_of_day)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}
