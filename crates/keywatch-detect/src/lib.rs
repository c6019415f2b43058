//! Exposure detection orchestration for keywatch.
//!
//! This crate composes the detection pipeline:
//!
//! - [`QuotaTracker`] - Daily archive-processing budget
//! - [`select_targets`] - Resume cursor over the remote archive index
//! - [`SingleFlight`] - At-most-one concurrent detection run
//! - [`DetectionOrchestrator`] - One run of download, unpack, match and commit
//! - [`ExposureService`] - Lifecycle, background tasks and rescheduling
//!
//! Collaborators the orchestrator depends on are expressed as traits in
//! [`collaborators`], [`NotificationSink`], [`PlatformStatus`] and
//! [`HostScheduler`].

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/keywatch/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod collaborators;
mod config;
mod cursor;
mod error;
mod guard;
mod notify;
mod orchestrator;
mod platform;
mod quota;
mod service;

#[cfg(test)]
mod test_support;

pub use collaborators::{
    ArchiveDownloader, ArchiveUnpacker, Collaborators, ConfigurationSource, MatchingEngine,
    RemoteIndexSource,
};
pub use config::DetectionConfig;
pub use cursor::{select_targets, start_index};
pub use error::{DetectionError, PlatformError, ServiceError};
pub use guard::{SingleFlight, SingleFlightPermit};
pub use notify::{
    Advisory, AdvisoryKind, LogNotificationSink, NotificationSink, NotifyError, clear_best_effort,
    post_best_effort,
};
pub use orchestrator::{DetectionOrchestrator, DetectionOutcome, RunState, TIMED_OUT_DESCRIPTION};
pub use platform::{AuthorizationState, EnabledState, PlatformStatus, notify_radio_off_if_needed};
pub use quota::QuotaTracker;
pub use service::{ExposureService, HostScheduler, SchedulerError, StatusChange, TaskRequest};

/// Re-exported so callers can build the cancellation signal a run observes.
pub use tokio_util::sync::CancellationToken;
