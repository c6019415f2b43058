//! Core types for the keywatch exposure detection orchestrator.
//!
//! This crate provides the data structures shared by every keywatch crate:
//!
//! - [`UserState`] - The persisted singleton holding quota and resume cursor
//! - [`Exposure`] - An exposure event reported by the matching engine
//! - [`ExposureSummary`] - Raw summary of one matching-engine pass
//! - [`ExposureDetectionSummary`] - A stored, day-bucketed detection summary
//! - [`ExposureConfiguration`] - Scoring configuration handed to the engine
//! - [`DownloadedPackage`] / [`UnpackedArchives`] - Archive payloads in flight

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/keywatch/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod archive;
mod configuration;
mod error;
mod exposure;
mod user_state;

pub use archive::{DownloadedPackage, UnpackedArchives};
pub use configuration::ExposureConfiguration;
pub use error::{EngineError, FetchError, UnpackError};
pub use exposure::{
    Exposure, ExposureDetectionSummary, ExposureId, ExposureSummary, RawExposure, start_of_day,
};
pub use user_state::{DEFAULT_DAILY_FILE_CAPACITY, UserState};
