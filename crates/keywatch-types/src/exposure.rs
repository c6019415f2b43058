//! Exposure records and detection summaries.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for a stored exposure.
pub type ExposureId = Uuid;

/// An exposure as reported by the matching engine, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExposure {
    /// Day the exposure took place.
    pub date: DateTime<Utc>,
    /// Accumulated time spent in proximity.
    pub duration: Duration,
    /// Engine-computed risk score for this exposure.
    pub total_risk_score: u32,
    /// Transmission risk level of the matched key.
    pub transmission_risk_level: u32,
}

/// A stored exposure event. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exposure {
    /// Identifier generated when the exposure is recorded.
    pub id: ExposureId,
    /// Day the exposure took place.
    pub date: DateTime<Utc>,
    /// Accumulated time spent in proximity.
    pub duration: Duration,
    /// Engine-computed risk score for this exposure.
    pub total_risk_score: u32,
    /// Transmission risk level of the matched key.
    pub transmission_risk_level: u32,
}

impl Exposure {
    /// Stamps a raw engine exposure with a freshly generated identifier.
    #[must_use]
    pub fn from_raw(raw: RawExposure) -> Self {
        Self {
            id: Uuid::new_v4(),
            date: raw.date,
            duration: raw.duration,
            total_risk_score: raw.total_risk_score,
            transmission_risk_level: raw.transmission_risk_level,
        }
    }
}

/// Summary returned by one matching-engine detection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ExposureSummary {
    /// Days since the most recent matched exposure.
    pub days_since_last_exposure: u32,
    /// Number of diagnosis keys that matched.
    pub matched_key_count: u64,
    /// Highest risk score among the matched exposures.
    pub maximum_risk_score: u32,
    /// Time spent in each attenuation bucket.
    pub attenuation_durations: Vec<Duration>,
}

/// A detection summary as persisted, bucketed by the day it was received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureDetectionSummary {
    /// When the summary was received.
    pub date_received: DateTime<Utc>,
    /// Midnight (UTC) of the day the summary was received.
    pub start_of_date_received: DateTime<Utc>,
    /// Number of summaries already stored for the same day.
    pub sequence_in_day: u32,
    /// Days since the most recent matched exposure.
    pub days_since_last_exposure: u32,
    /// Number of diagnosis keys that matched.
    pub matched_key_count: u64,
    /// Highest risk score among the matched exposures.
    pub maximum_risk_score: u32,
    /// Time spent in each attenuation bucket.
    pub attenuation_durations: Vec<Duration>,
}

impl ExposureDetectionSummary {
    /// Creates a stored summary from an engine summary.
    #[must_use]
    pub fn new(summary: &ExposureSummary, received: DateTime<Utc>, sequence_in_day: u32) -> Self {
        Self {
            date_received: received,
            start_of_date_received: start_of_day(received),
            sequence_in_day,
            days_since_last_exposure: summary.days_since_last_exposure,
            matched_key_count: summary.matched_key_count,
            maximum_risk_score: summary.maximum_risk_score,
            attenuation_durations: summary.attenuation_durations.clone(),
        }
    }
}

/// Truncates a timestamp to midnight UTC of the same day.
#[must_use]
pub fn start_of_day(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc()
}
