//! Local advisories: fire-and-forget user notifications.

use std::fmt::Debug;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The kinds of advisory keywatch posts. At most one of each is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdvisoryKind {
    /// The proximity radio is off, so keys are not being exchanged.
    RadioOff,
    /// The last detection run failed.
    DetectionError,
}

impl AdvisoryKind {
    /// Returns the stable identifier used to replace or clear the advisory.
    #[must_use]
    pub const fn identifier(&self) -> &'static str {
        match self {
            Self::RadioOff => "keywatch.bluetooth-off",
            Self::DetectionError => "keywatch.detection-error",
        }
    }
}

/// A local advisory ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    /// What the advisory is about.
    pub kind: AdvisoryKind,
    /// Short title.
    pub title: String,
    /// Body text.
    pub body: String,
}

impl Advisory {
    /// Reminder to turn the radio back on.
    #[must_use]
    pub fn radio_off() -> Self {
        Self {
            kind: AdvisoryKind::RadioOff,
            title: "Bluetooth is off".to_string(),
            body: "Turn on Bluetooth so your device can exchange keys with devices nearby."
                .to_string(),
        }
    }

    /// Advisory for a failed detection run.
    #[must_use]
    pub fn detection_error(description: Option<&str>) -> Self {
        Self {
            kind: AdvisoryKind::DetectionError,
            title: "Exposure detection error".to_string(),
            body: description
                .unwrap_or("Exposure detection could not be completed.")
                .to_string(),
        }
    }
}

/// Errors reported by a notification sink.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The platform refused or failed to deliver the advisory.
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Delivers local advisories.
pub trait NotificationSink: Send + Sync + Debug {
    /// Posts an advisory, replacing any delivered advisory of the same kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the advisory cannot be delivered.
    fn post(&self, advisory: &Advisory) -> Result<(), NotifyError>;

    /// Removes a delivered advisory.
    ///
    /// # Errors
    ///
    /// Returns an error if the advisory cannot be removed.
    fn clear(&self, kind: AdvisoryKind) -> Result<(), NotifyError>;
}

/// Posts an advisory, logging instead of propagating delivery failures.
pub fn post_best_effort(sink: &dyn NotificationSink, advisory: &Advisory) {
    if let Err(e) = sink.post(advisory) {
        warn!(kind = advisory.kind.identifier(), error = %e, "failed to post advisory");
    }
}

/// Clears an advisory, logging instead of propagating failures.
pub fn clear_best_effort(sink: &dyn NotificationSink, kind: AdvisoryKind) {
    if let Err(e) = sink.clear(kind) {
        warn!(kind = kind.identifier(), error = %e, "failed to clear advisory");
    }
}

/// A sink that writes advisories to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn post(&self, advisory: &Advisory) -> Result<(), NotifyError> {
        info!(
            kind = advisory.kind.identifier(),
            title = %advisory.title,
            "{}",
            advisory.body
        );
        Ok(())
    }

    fn clear(&self, kind: AdvisoryKind) -> Result<(), NotifyError> {
        debug!(kind = kind.identifier(), "advisory cleared");
        Ok(())
    }
}
