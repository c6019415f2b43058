//! In-memory state storage.

use crate::{Result, StateChange, StateError, StateEvents, StateStore};
use chrono::{DateTime, Utc};
use keywatch_types::{DEFAULT_DAILY_FILE_CAPACITY, Exposure, ExposureDetectionSummary, UserState};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

#[derive(Debug, Default)]
struct Records {
    user_state: Option<UserState>,
    exposures: Vec<Exposure>,
    summaries: Vec<ExposureDetectionSummary>,
}

/// A [`StateStore`] that keeps everything in process memory.
#[derive(Debug)]
pub struct MemoryStateStore {
    records: Mutex<Records>,
    daily_file_capacity: u32,
    events: StateEvents,
}

impl MemoryStateStore {
    /// Creates an empty store using the default daily capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_daily_file_capacity(DEFAULT_DAILY_FILE_CAPACITY)
    }

    /// Creates an empty store with the given daily capacity.
    #[must_use]
    pub fn with_daily_file_capacity(daily_file_capacity: u32) -> Self {
        Self {
            records: Mutex::new(Records::default()),
            daily_file_capacity,
            events: StateEvents::new(),
        }
    }

    /// Creates a store seeded with an existing user state.
    #[must_use]
    pub fn with_user_state(state: UserState) -> Self {
        let store = Self::new();
        if let Ok(mut records) = store.records.lock() {
            records.user_state = Some(state);
        }
        store
    }

    fn lock(&self) -> Result<MutexGuard<'_, Records>> {
        self.records.lock().map_err(|_| StateError::Poisoned)
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemoryStateStore {
    fn user_state(&self) -> Result<UserState> {
        let mut records = self.lock()?;
        Ok(records
            .user_state
            .get_or_insert_with(|| UserState::new(self.daily_file_capacity))
            .clone())
    }

    fn save_user_state(&self, state: &UserState) -> Result<()> {
        self.lock()?.user_state = Some(state.clone());
        self.events.publish(StateChange::UserState(state.clone()));
        Ok(())
    }

    fn reset_user_state(&self) -> Result<UserState> {
        let state = UserState::new(self.daily_file_capacity);
        self.save_user_state(&state)?;
        Ok(state)
    }

    fn exposures(&self) -> Result<Vec<Exposure>> {
        Ok(self.lock()?.exposures.clone())
    }

    fn append_exposures(&self, exposures: &[Exposure]) -> Result<()> {
        if exposures.is_empty() {
            return Ok(());
        }
        let snapshot = {
            let mut records = self.lock()?;
            records.exposures.extend_from_slice(exposures);
            records.exposures.clone()
        };
        self.events.publish(StateChange::Exposures(snapshot));
        Ok(())
    }

    fn detection_summaries(&self) -> Result<Vec<ExposureDetectionSummary>> {
        Ok(self.lock()?.summaries.clone())
    }

    fn append_detection_summary(&self, summary: &ExposureDetectionSummary) -> Result<()> {
        self.lock()?.summaries.push(summary.clone());
        Ok(())
    }

    fn prune_detection_summaries(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut records = self.lock()?;
        let before = records.summaries.len();
        records.summaries.retain(|s| s.date_received >= cutoff);
        Ok(before - records.summaries.len())
    }

    fn commit_run(
        &self,
        state: &UserState,
        exposures: &[Exposure],
        summary: Option<&ExposureDetectionSummary>,
        prune_cutoff: DateTime<Utc>,
    ) -> Result<usize> {
        let (pruned, snapshot) = {
            let mut records = self.lock()?;
            records.exposures.extend_from_slice(exposures);
            if let Some(summary) = summary {
                records.summaries.push(summary.clone());
            }
            let before = records.summaries.len();
            records.summaries.retain(|s| s.date_received >= prune_cutoff);
            records.user_state = Some(state.clone());
            let snapshot = (!exposures.is_empty()).then(|| records.exposures.clone());
            (before - records.summaries.len(), snapshot)
        };

        if let Some(snapshot) = snapshot {
            self.events.publish(StateChange::Exposures(snapshot));
        }
        self.events.publish(StateChange::UserState(state.clone()));
        Ok(pruned)
    }

    fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }
}
