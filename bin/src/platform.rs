//! Platform status taken from configuration.

use crate::config::PlatformConfig;
use keywatch_detect::{AuthorizationState, EnabledState, PlatformError, PlatformStatus};
use std::sync::atomic::{AtomicBool, Ordering};

/// Reports the platform state declared in `keywatch.toml`.
///
/// The enabled flag can be switched for the life of the process; the file is
/// never rewritten.
#[derive(Debug)]
pub(crate) struct StaticPlatform {
    authorized: bool,
    enabled: AtomicBool,
    radio_enabled: bool,
}

impl StaticPlatform {
    pub(crate) const fn from_config(config: &PlatformConfig) -> Self {
        Self {
            authorized: config.authorized,
            enabled: AtomicBool::new(config.enabled),
            radio_enabled: config.radio_enabled,
        }
    }
}

impl PlatformStatus for StaticPlatform {
    fn authorization_state(&self) -> AuthorizationState {
        if self.authorized {
            AuthorizationState::Authorized
        } else {
            AuthorizationState::Unauthorized
        }
    }

    fn enabled_state(&self) -> EnabledState {
        if self.enabled.load(Ordering::SeqCst) {
            EnabledState::Enabled
        } else {
            EnabledState::Disabled
        }
    }

    fn is_radio_enabled(&self) -> bool {
        self.radio_enabled
    }

    fn set_enabled(&self, enabled: bool) -> Result<EnabledState, PlatformError> {
        if enabled && !self.authorized {
            return Err(PlatformError::CannotEnableNotifications(
                "exposure notifications are not authorized".to_string(),
            ));
        }
        self.enabled.store(enabled, Ordering::SeqCst);
        Ok(self.enabled_state())
    }
}
