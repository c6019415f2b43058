//! Error types for detection runs and the service surface.

use crate::SchedulerError;
use keywatch_store::StateError;
use keywatch_types::{EngineError, FetchError, UnpackError};
use thiserror::Error;

/// Why a detection run did not complete.
#[derive(Error, Debug)]
pub enum DetectionError {
    /// Another run holds the single-flight guard.
    #[error("Detection already in progress")]
    AlreadyInProgress,

    /// Fetching the index or an archive failed.
    #[error("Network request failed: {0}")]
    Network(#[from] FetchError),

    /// Unpacking downloaded archives failed.
    #[error("Failed to unpack key archives: {0}")]
    Unpack(#[from] UnpackError),

    /// The matching engine reported an error.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The host's execution budget expired.
    #[error("Detection cancelled")]
    Cancelled,

    /// Persisted state could not be read or written.
    #[error("State storage error: {0}")]
    Store(#[from] StateError),
}

impl DetectionError {
    /// Returns true for the cancellation outcome.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if the run failed while processing and the failure is
    /// recorded in persisted state.
    #[must_use]
    pub const fn is_processing_failure(&self) -> bool {
        !matches!(self, Self::AlreadyInProgress | Self::Cancelled)
    }
}

/// Errors reported by the platform when changing its state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The platform refused to change the enabled state.
    #[error("Cannot enable exposure notifications: {0}")]
    CannotEnableNotifications(String),
}

/// Errors from the [`ExposureService`](crate::ExposureService) surface.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// No detection has ever been attempted.
    #[error("No detection has been performed yet")]
    DetectionNeverPerformed,

    /// Persisted state could not be read or written.
    #[error(transparent)]
    State(#[from] StateError),

    /// The platform refused a state change.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// The host scheduler rejected a request.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Stored records could not be serialized.
    #[error("Failed to serialize exposures: {0}")]
    Json(#[from] serde_json::Error),
}
