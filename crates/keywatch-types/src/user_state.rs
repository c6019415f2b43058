//! The persisted user state singleton.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of key archives a device may process per quota window.
pub const DEFAULT_DAILY_FILE_CAPACITY: u32 = 15;

/// Persisted detection state. Exactly one record exists per installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    /// Archives that may still be processed before the next quota reset.
    pub remaining_daily_file_processing_capacity: u32,
    /// When the quota was last reset. `None` until the first detection attempt.
    pub date_last_quota_reset: Option<DateTime<Utc>>,
    /// Remote path of the last archive that was fully processed.
    pub last_processed_archive_path: String,
    /// Description of the error that ended the most recent run, if any.
    pub last_detection_error_description: Option<String>,
    /// Key used to sign verification requests.
    pub hmac_key: String,
    /// Revision token returned by the key server on the last publish.
    pub revision_token: String,
}

impl UserState {
    /// Creates a fresh state with the given daily capacity.
    #[must_use]
    pub const fn new(daily_file_capacity: u32) -> Self {
        Self {
            remaining_daily_file_processing_capacity: daily_file_capacity,
            date_last_quota_reset: None,
            last_processed_archive_path: String::new(),
            last_detection_error_description: None,
            hmac_key: String::new(),
            revision_token: String::new(),
        }
    }

    /// Returns true if at least one archive has ever been processed.
    #[must_use]
    pub const fn has_processed_archive(&self) -> bool {
        !self.last_processed_archive_path.is_empty()
    }

    /// Returns true if the daily quota has been used up.
    #[must_use]
    pub const fn is_quota_exhausted(&self) -> bool {
        self.remaining_daily_file_processing_capacity == 0
    }
}

impl Default for UserState {
    fn default() -> Self {
        Self::new(DEFAULT_DAILY_FILE_CAPACITY)
    }
}
