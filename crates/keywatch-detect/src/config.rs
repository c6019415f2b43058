//! Detection tuning parameters.

use keywatch_types::DEFAULT_DAILY_FILE_CAPACITY;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for detection runs and their scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Archives that may be processed per quota window.
    pub daily_file_capacity: u32,
    /// Hours that must elapse before the quota is reset.
    pub quota_window_hours: u32,
    /// Days a detection summary is retained.
    pub summary_retention_days: u32,
    /// Execution-time budget the host grants a background run (seconds).
    pub execution_budget_secs: u64,
    /// Delay before the next background run may begin (seconds).
    pub schedule_interval_secs: u64,
    /// Whether to post an advisory when a run fails.
    pub notify_on_error: bool,
    /// Identifier the background task is registered under.
    pub task_identifier: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            daily_file_capacity: DEFAULT_DAILY_FILE_CAPACITY,
            quota_window_hours: 24,
            summary_retention_days: 14,
            execution_budget_secs: 300,
            schedule_interval_secs: 2 * 60 * 60,
            notify_on_error: cfg!(debug_assertions),
            task_identifier: "keywatch.exposure-notification".to_string(),
        }
    }
}

impl DetectionConfig {
    /// Returns the quota reset window.
    #[must_use]
    pub fn quota_window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.quota_window_hours))
    }

    /// Returns how long detection summaries are kept.
    #[must_use]
    pub fn summary_retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.summary_retention_days))
    }

    /// Returns the execution-time budget for one background run.
    #[must_use]
    pub const fn execution_budget(&self) -> Duration {
        Duration::from_secs(self.execution_budget_secs)
    }

    /// Returns the delay between background runs.
    #[must_use]
    pub const fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_secs)
    }
}
