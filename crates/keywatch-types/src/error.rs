//! Error types for the detection collaborators.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the key server: index, archive and configuration fetches.
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Server returned an error status.
    #[error("Server error for '{url}': {status}")]
    ServerError {
        /// The requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// A URL could not be built from the configured endpoint.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The response body could not be interpreted.
    #[error("Invalid response body from '{url}': {reason}")]
    InvalidBody {
        /// The requested URL.
        url: String,
        /// Why the body was rejected.
        reason: String,
    },
}

/// Errors that can occur while unpacking downloaded key archives.
#[derive(Error, Debug)]
pub enum UnpackError {
    /// The downloaded package was empty.
    #[error("Archive '{0}' is empty")]
    EmptyInput(String),

    /// The package is not a readable archive.
    #[error("Archive '{path}' is malformed: {reason}")]
    Malformed {
        /// Remote path of the archive.
        path: String,
        /// Why the archive was rejected.
        reason: String,
    },

    /// A required entry is missing from the archive.
    #[error("Archive '{path}' has no '{entry}' entry")]
    MissingEntry {
        /// Remote path of the archive.
        path: String,
        /// The missing entry name.
        entry: &'static str,
    },

    /// Failed to write unpacked key material.
    #[error("Failed to write '{path}': {source}")]
    Write {
        /// The local path that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to create the scratch directory.
    #[error("Failed to create scratch directory: {0}")]
    ScratchDir(#[source] std::io::Error),

    /// The blocking unpack task did not complete.
    #[error("Unpack task failed: {0}")]
    Task(String),
}

/// Errors reported by the matching engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine is not active or not authorized.
    #[error("Matching engine unavailable: {0}")]
    Unavailable(String),

    /// The detection pass failed.
    #[error("Exposure detection failed: {0}")]
    Detection(String),

    /// Fetching detailed exposure information failed.
    #[error("Exposure info request failed: {0}")]
    ExposureInfo(String),
}
