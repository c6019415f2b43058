//! Platform authorization and radio state.

use crate::{
    Advisory, AdvisoryKind, NotificationSink, PlatformError, clear_best_effort, post_best_effort,
};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Whether the user granted exposure-notification authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationState {
    /// Authorization granted.
    Authorized,
    /// Authorization denied or not yet requested.
    Unauthorized,
}

impl AuthorizationState {
    /// Returns the state as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Authorized => "AUTHORIZED",
            Self::Unauthorized => "UNAUTHORIZED",
        }
    }
}

impl std::fmt::Display for AuthorizationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether exposure notifications are switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnabledState {
    /// Exposure notifications are on.
    Enabled,
    /// Exposure notifications are off.
    Disabled,
}

impl EnabledState {
    /// Returns the state as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
        }
    }
}

impl std::fmt::Display for EnabledState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reports platform authorization and radio state.
pub trait PlatformStatus: Send + Sync + Debug {
    /// Current authorization.
    fn authorization_state(&self) -> AuthorizationState;

    /// Whether exposure notifications are switched on.
    fn enabled_state(&self) -> EnabledState;

    /// Whether the proximity radio is on.
    fn is_radio_enabled(&self) -> bool;

    /// Switches exposure notifications on or off, returning the new state.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::CannotEnableNotifications`] if the platform
    /// refuses the change.
    fn set_enabled(&self, enabled: bool) -> Result<EnabledState, PlatformError>;
}

/// Posts the radio-off advisory when authorized with the radio off, and clears
/// it otherwise. Returns whether the advisory was posted.
pub fn notify_radio_off_if_needed(
    platform: &dyn PlatformStatus,
    notifications: &dyn NotificationSink,
) -> bool {
    let radio_off = platform.authorization_state() == AuthorizationState::Authorized
        && !platform.is_radio_enabled();

    if radio_off {
        post_best_effort(notifications, &Advisory::radio_off());
    } else {
        clear_best_effort(notifications, AdvisoryKind::RadioOff);
    }
    radio_off
}
