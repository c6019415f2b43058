//! Daily archive-processing quota.

use crate::DetectionConfig;
use chrono::{DateTime, Duration, Utc};
use keywatch_store::{StateError, StateStore};
use keywatch_types::UserState;
use tracing::debug;

/// Tracks and resets the daily file-processing budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaTracker {
    daily_file_capacity: u32,
    window: Duration,
}

impl QuotaTracker {
    /// Creates a tracker that restores `daily_file_capacity` once `window` has elapsed.
    #[must_use]
    pub const fn new(daily_file_capacity: u32, window: Duration) -> Self {
        Self {
            daily_file_capacity,
            window,
        }
    }

    /// Creates a tracker from detection configuration.
    #[must_use]
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.daily_file_capacity, config.quota_window())
    }

    /// Returns the capacity restored on each reset.
    #[must_use]
    pub const fn daily_file_capacity(&self) -> u32 {
        self.daily_file_capacity
    }

    /// Applies a reset to `state` if one is due, returning whether it changed.
    ///
    /// A state that has never been reset is initialized. Otherwise the quota
    /// resets only when strictly more than the window has elapsed.
    pub fn refresh(&self, state: &mut UserState, now: DateTime<Utc>) -> bool {
        let due = state
            .date_last_quota_reset
            .is_none_or(|last| now - last > self.window);

        if due {
            state.remaining_daily_file_processing_capacity = self.daily_file_capacity;
            state.date_last_quota_reset = Some(now);
        }
        due
    }

    /// Loads the user state, resets the quota if due and persists the change.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be read or written.
    pub fn ensure_fresh_quota(
        &self,
        store: &dyn StateStore,
        now: DateTime<Utc>,
    ) -> Result<UserState, StateError> {
        let mut state = store.user_state()?;

        if self.refresh(&mut state, now) {
            debug!(
                capacity = state.remaining_daily_file_processing_capacity,
                "daily file capacity reset"
            );
            store.save_user_state(&state)?;
        }

        Ok(state)
    }
}
