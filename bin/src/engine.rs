//! Matching engine used when no device integration is available.

use async_trait::async_trait;
use keywatch_detect::MatchingEngine;
use keywatch_types::{EngineError, ExposureConfiguration, ExposureSummary, RawExposure};
use std::path::PathBuf;
use tracing::info;

/// Validates the unpacked key files and reports no matches.
///
/// Exercises the full download and unpack pipeline without local keys to
/// match against.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct DryRunEngine;

#[async_trait]
impl MatchingEngine for DryRunEngine {
    async fn detect(
        &self,
        configuration: &ExposureConfiguration,
        key_files: &[PathBuf],
    ) -> Result<Option<ExposureSummary>, EngineError> {
        let mut total_bytes = 0u64;
        for file in key_files {
            let metadata = tokio::fs::metadata(file).await.map_err(|e| {
                EngineError::Detection(format!("unreadable key file {}: {e}", file.display()))
            })?;
            total_bytes += metadata.len();
        }

        info!(
            files = key_files.len(),
            bytes = total_bytes,
            threshold = configuration.minimum_risk_score,
            "dry run: key files verified, no local keys to match"
        );
        Ok(None)
    }

    async fn exposure_info(
        &self,
        _summary: &ExposureSummary,
    ) -> Result<Vec<RawExposure>, EngineError> {
        Ok(Vec::new())
    }
}
