//! External capabilities the orchestrator drives.
//!
//! Each trait is one step of the pipeline. Implementations own transport,
//! decompression and matching; the orchestrator only sequences them and
//! interprets their results.

use crate::NotificationSink;
use async_trait::async_trait;
use keywatch_store::StateStore;
use keywatch_types::{
    DownloadedPackage, EngineError, ExposureConfiguration, ExposureSummary, FetchError,
    RawExposure, UnpackError, UnpackedArchives,
};
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

/// Source of the remote diagnosis-key archive index.
#[async_trait]
pub trait RemoteIndexSource: Send + Sync + Debug {
    /// Returns archive paths in publication order, oldest first.
    async fn fetch_index(&self) -> Result<Vec<String>, FetchError>;
}

/// Downloads a single key archive.
#[async_trait]
pub trait ArchiveDownloader: Send + Sync + Debug {
    /// Downloads the archive published at `path`.
    async fn download(&self, path: &str) -> Result<DownloadedPackage, FetchError>;
}

/// Unpacks downloaded archives into local key-material files.
#[async_trait]
pub trait ArchiveUnpacker: Send + Sync + Debug {
    /// Unpacks every package. The returned value owns the local files.
    async fn unpack(&self, packages: Vec<DownloadedPackage>)
    -> Result<UnpackedArchives, UnpackError>;
}

/// Source of the current matching configuration.
#[async_trait]
pub trait ConfigurationSource: Send + Sync + Debug {
    /// Fetches the configuration. Failures fall back to the last known copy.
    async fn fetch_configuration(&self) -> Result<ExposureConfiguration, FetchError>;
}

/// The platform key-matching engine.
#[async_trait]
pub trait MatchingEngine: Send + Sync + Debug {
    /// Matches local keys against the given key files.
    async fn detect(
        &self,
        configuration: &ExposureConfiguration,
        key_files: &[PathBuf],
    ) -> Result<Option<ExposureSummary>, EngineError>;

    /// Returns per-exposure detail for a summary.
    async fn exposure_info(&self, summary: &ExposureSummary)
    -> Result<Vec<RawExposure>, EngineError>;
}

/// Everything a [`DetectionOrchestrator`](crate::DetectionOrchestrator) calls out to.
#[derive(Debug, Clone)]
pub struct Collaborators {
    /// Remote archive index.
    pub index: Arc<dyn RemoteIndexSource>,
    /// Archive downloads.
    pub downloader: Arc<dyn ArchiveDownloader>,
    /// Archive unpacking.
    pub unpacker: Arc<dyn ArchiveUnpacker>,
    /// Matching configuration.
    pub configuration: Arc<dyn ConfigurationSource>,
    /// Matching engine.
    pub engine: Arc<dyn MatchingEngine>,
    /// Persisted state.
    pub store: Arc<dyn StateStore>,
    /// Local advisories.
    pub notifications: Arc<dyn NotificationSink>,
}
