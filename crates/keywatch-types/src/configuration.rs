//! Matching configuration handed to the engine.

use crate::ExposureSummary;
use serde::{Deserialize, Serialize};

/// Scoring parameters for the matching engine.
///
/// Served by the key server as camelCase JSON. When the server cannot be
/// reached the [`placeholder`](Self::placeholder) configuration is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureConfiguration {
    /// Summaries must score strictly above this value to count as exposing.
    pub minimum_risk_score: u32,
    /// Attenuation thresholds (dB) bounding the duration buckets.
    pub attenuation_duration_thresholds: Vec<u32>,
    /// Weights for each attenuation level.
    pub attenuation_level_values: Vec<u32>,
    /// Weights for each days-since-exposure level.
    pub days_since_last_exposure_level_values: Vec<u32>,
    /// Weights for each exposure-duration level.
    pub duration_level_values: Vec<u32>,
    /// Weights for each transmission risk level.
    pub transmission_risk_level_values: Vec<u32>,
}

impl ExposureConfiguration {
    /// Returns the configuration used until a server copy is fetched.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            minimum_risk_score: 0,
            attenuation_duration_thresholds: vec![50, 70],
            attenuation_level_values: vec![1; 8],
            days_since_last_exposure_level_values: vec![1; 8],
            duration_level_values: vec![1; 8],
            transmission_risk_level_values: vec![1; 8],
        }
    }

    /// Returns true if the summary scores strictly above the threshold.
    #[must_use]
    pub const fn is_exposing(&self, summary: &ExposureSummary) -> bool {
        summary.maximum_risk_score > self.minimum_risk_score
    }
}

impl Default for ExposureConfiguration {
    fn default() -> Self {
        Self::placeholder()
    }
}
