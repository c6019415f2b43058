//! JSON file storage for persisted detection state.

use crate::{StateChange, StateEvents, StateStore};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use keywatch_types::{DEFAULT_DAILY_FILE_CAPACITY, Exposure, ExposureDetectionSummary, UserState};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

/// Errors that can occur during state management operations.
#[derive(Error, Debug)]
pub enum StateError {
    /// Failed to create a directory.
    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        /// The path that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to read a file.
    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to write a file.
    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        /// The path that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse JSON.
    #[error("Failed to parse state file '{path}': {source}")]
    ParseJson {
        /// The path that could not be parsed.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Failed to serialize JSON.
    #[error("Failed to serialize state: {0}")]
    SerializeJson(#[from] serde_json::Error),

    /// An in-memory store lock was poisoned by a panicking writer.
    #[error("State lock poisoned")]
    Poisoned,
}

/// Result type for state operations.
pub type Result<T> = std::result::Result<T, StateError>;

/// Manages persisted detection state as JSON files.
///
/// Layout under the base directory:
/// - `user_state.json` - the [`UserState`] singleton
/// - `exposures.json` - every stored [`Exposure`]
/// - `detection_summaries.json` - retained [`ExposureDetectionSummary`] records
#[derive(Debug, Clone)]
pub struct StateManager {
    /// Base directory for state storage.
    base_path: PathBuf,
    /// Capacity given to a newly created user state.
    daily_file_capacity: u32,
    /// Change broadcaster.
    events: StateEvents,
}

impl StateManager {
    const USER_STATE_FILE: &'static str = "user_state.json";
    const EXPOSURES_FILE: &'static str = "exposures.json";
    const SUMMARIES_FILE: &'static str = "detection_summaries.json";

    /// Creates a new state manager with the given base path.
    ///
    /// Creates the base directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(base_path: PathBuf) -> Result<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| StateError::CreateDir {
                path: base_path.clone(),
                source: e,
            })?;
        }

        Ok(Self {
            base_path,
            daily_file_capacity: DEFAULT_DAILY_FILE_CAPACITY,
            events: StateEvents::new(),
        })
    }

    /// Sets the capacity given to a newly created user state.
    #[must_use]
    pub const fn with_daily_file_capacity(mut self, capacity: u32) -> Self {
        self.daily_file_capacity = capacity;
        self
    }

    /// Returns the default path for keywatch state storage.
    ///
    /// Uses the `directories` crate to find the appropriate location:
    /// - Linux: `~/.local/share/keywatch/`
    /// - macOS: `~/Library/Application Support/keywatch/`
    /// - Windows: `C:\Users\<User>\AppData\Roaming\keywatch\`
    ///
    /// Falls back to `~/.keywatch/` if the platform-specific location
    /// cannot be determined.
    #[must_use]
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("", "", "keywatch").map_or_else(dirs_fallback, |proj_dirs| {
            proj_dirs.data_dir().to_path_buf()
        })
    }

    /// Creates a state manager at the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn with_default_path() -> Result<Self> {
        Self::new(Self::default_path())
    }

    /// Returns the base path for state storage.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Returns the capacity given to a newly created user state.
    #[must_use]
    pub const fn daily_file_capacity(&self) -> u32 {
        self.daily_file_capacity
    }

    /// Returns the path to the user state file.
    #[must_use]
    pub fn user_state_path(&self) -> PathBuf {
        self.base_path.join(Self::USER_STATE_FILE)
    }

    fn exposures_path(&self) -> PathBuf {
        self.base_path.join(Self::EXPOSURES_FILE)
    }

    fn summaries_path(&self) -> PathBuf {
        self.base_path.join(Self::SUMMARIES_FILE)
    }

    /// Reads a JSON file, returning `None` if it does not exist.
    fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|e| StateError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StateError::ParseJson {
                path: path.to_path_buf(),
                source: e,
            })
    }

    /// Writes a JSON file via a temporary sibling so readers never see a torn write.
    fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, json).map_err(|e| StateError::WriteFile {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, path).map_err(|e| StateError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Writes a JSON document to its temporary sibling and records the
    /// pending rename in `staged`.
    fn stage_json<T: Serialize + ?Sized>(
        path: &Path,
        value: &T,
        staged: &mut Vec<(PathBuf, PathBuf)>,
    ) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        staged.push((tmp.clone(), path.to_path_buf()));

        fs::write(&tmp, json).map_err(|e| StateError::WriteFile {
            path: tmp,
            source: e,
        })
    }

    /// Removes staged temporary files, leaving the committed documents alone.
    fn discard_staged(staged: &[(PathBuf, PathBuf)]) {
        for (tmp, _) in staged {
            if tmp.is_file() {
                let _ = fs::remove_file(tmp);
            }
        }
    }

    fn load_summaries(&self) -> Result<Vec<ExposureDetectionSummary>> {
        Ok(Self::read_json(&self.summaries_path())?.unwrap_or_default())
    }
}

impl StateStore for StateManager {
    fn user_state(&self) -> Result<UserState> {
        if let Some(state) = Self::read_json(&self.user_state_path())? {
            return Ok(state);
        }

        debug!(
            capacity = self.daily_file_capacity,
            "creating initial user state"
        );
        let state = UserState::new(self.daily_file_capacity);
        self.save_user_state(&state)?;
        Ok(state)
    }

    fn save_user_state(&self, state: &UserState) -> Result<()> {
        Self::write_json(&self.user_state_path(), state)?;
        self.events.publish(StateChange::UserState(state.clone()));
        Ok(())
    }

    fn reset_user_state(&self) -> Result<UserState> {
        let state = UserState::new(self.daily_file_capacity);
        self.save_user_state(&state)?;
        Ok(state)
    }

    fn exposures(&self) -> Result<Vec<Exposure>> {
        Ok(Self::read_json(&self.exposures_path())?.unwrap_or_default())
    }

    fn append_exposures(&self, exposures: &[Exposure]) -> Result<()> {
        if exposures.is_empty() {
            return Ok(());
        }

        let mut stored = self.exposures()?;
        stored.extend_from_slice(exposures);
        Self::write_json(&self.exposures_path(), &stored)?;
        self.events.publish(StateChange::Exposures(stored));
        Ok(())
    }

    fn detection_summaries(&self) -> Result<Vec<ExposureDetectionSummary>> {
        self.load_summaries()
    }

    fn append_detection_summary(&self, summary: &ExposureDetectionSummary) -> Result<()> {
        let mut stored = self.load_summaries()?;
        stored.push(summary.clone());
        Self::write_json(&self.summaries_path(), &stored)
    }

    fn prune_detection_summaries(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut stored = self.load_summaries()?;
        let before = stored.len();
        stored.retain(|s| s.date_received >= cutoff);

        let removed = before - stored.len();
        if removed > 0 {
            Self::write_json(&self.summaries_path(), &stored)?;
        }
        Ok(removed)
    }

    fn commit_run(
        &self,
        state: &UserState,
        exposures: &[Exposure],
        summary: Option<&ExposureDetectionSummary>,
        prune_cutoff: DateTime<Utc>,
    ) -> Result<usize> {
        let mut stored = self.exposures()?;
        stored.extend_from_slice(exposures);

        let mut summaries = self.load_summaries()?;
        summaries.extend(summary.cloned());
        let before = summaries.len();
        summaries.retain(|s| s.date_received >= prune_cutoff);
        let pruned = before - summaries.len();

        // Nothing is renamed into place until every document is on disk.
        let mut staged = Vec::with_capacity(3);
        let written = Self::stage_json(&self.exposures_path(), &stored, &mut staged)
            .and_then(|()| Self::stage_json(&self.summaries_path(), &summaries, &mut staged))
            .and_then(|()| Self::stage_json(&self.user_state_path(), state, &mut staged));
        if let Err(e) = written {
            Self::discard_staged(&staged);
            return Err(e);
        }

        for (tmp, path) in &staged {
            fs::rename(tmp, path).map_err(|e| StateError::WriteFile {
                path: path.clone(),
                source: e,
            })?;
        }
        debug!(exposures = exposures.len(), pruned, "committed detection run");

        if !exposures.is_empty() {
            self.events.publish(StateChange::Exposures(stored));
        }
        self.events.publish(StateChange::UserState(state.clone()));
        Ok(pruned)
    }

    fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }
}

/// Fallback for determining home directory.
fn dirs_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".keywatch")
}
