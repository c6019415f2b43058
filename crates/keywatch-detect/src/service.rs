//! Process-wide exposure service: lifecycle, background tasks and scheduling.

use crate::{
    AuthorizationState, DetectionConfig, DetectionOrchestrator, EnabledState, PlatformStatus,
    ServiceError, notify_radio_off_if_needed,
};
use chrono::{DateTime, Utc};
use keywatch_types::UserState;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A request for the host to run the background task again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRequest {
    /// Identifier the task was registered under.
    pub identifier: String,
    /// The task needs network access to make progress.
    pub requires_network_connectivity: bool,
    /// Earliest time the host may start the task.
    pub earliest_begin: Option<DateTime<Utc>>,
}

/// Errors reported by a host scheduler.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The task identifier was never registered.
    #[error("Background task '{0}' is not registered")]
    NotRegistered(String),

    /// The scheduler refused the request.
    #[error("Scheduler unavailable: {0}")]
    Unavailable(String),
}

/// The host facility that runs background tasks under an execution budget.
///
/// For each run the host hands the task a [`CancellationToken`] that it
/// cancels when the budget expires, and expects a success flag back.
pub trait HostScheduler: Send + Sync + Debug {
    /// Registers the task identifier. Must happen before the first submit.
    ///
    /// # Errors
    ///
    /// Returns an error if the host refuses the registration.
    fn register(&self, identifier: &str) -> Result<(), SchedulerError>;

    /// Requests a future run of a registered task.
    ///
    /// # Errors
    ///
    /// Returns an error if the task is unknown or the host refuses the request.
    fn submit(&self, request: TaskRequest) -> Result<(), SchedulerError>;

    /// Cancels pending runs and forgets the task.
    fn deregister(&self, identifier: &str);
}

/// Broadcast whenever the authorization or enabled state is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    /// Current authorization.
    pub authorization: AuthorizationState,
    /// Whether exposure notifications are on.
    pub enabled: EnabledState,
}

/// Owns the orchestrator for the lifetime of the process.
///
/// [`start`](Self::start) registers with the host scheduler, prefetches the
/// matching configuration and schedules the first run;
/// [`stop`](Self::stop) deregisters. Dropping a started service stops it.
#[derive(Debug)]
pub struct ExposureService {
    orchestrator: Arc<DetectionOrchestrator>,
    scheduler: Arc<dyn HostScheduler>,
    platform: Arc<dyn PlatformStatus>,
    task_identifier: String,
    schedule_interval: Duration,
    started: AtomicBool,
    status: broadcast::Sender<StatusChange>,
}

impl ExposureService {
    /// Creates a stopped service.
    #[must_use]
    pub fn new(
        orchestrator: Arc<DetectionOrchestrator>,
        scheduler: Arc<dyn HostScheduler>,
        platform: Arc<dyn PlatformStatus>,
        config: &DetectionConfig,
    ) -> Self {
        let (status, _) = broadcast::channel(8);
        Self {
            orchestrator,
            scheduler,
            platform,
            task_identifier: config.task_identifier.clone(),
            schedule_interval: config.schedule_interval(),
            started: AtomicBool::new(false),
            status,
        }
    }

    /// Returns the orchestrator.
    #[must_use]
    pub const fn orchestrator(&self) -> &Arc<DetectionOrchestrator> {
        &self.orchestrator
    }

    /// Returns the identifier the background task is registered under.
    #[must_use]
    pub fn task_identifier(&self) -> &str {
        &self.task_identifier
    }

    /// Returns true between [`start`](Self::start) and [`stop`](Self::stop).
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Registers the background task, refreshes configuration and schedules
    /// the first run. Calling it on a started service does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if registration or scheduling is refused.
    pub async fn start(&self) -> Result<(), ServiceError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Err(e) = self.scheduler.register(&self.task_identifier) {
            self.started.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        info!(task = %self.task_identifier, "exposure service started");

        self.orchestrator.prefetch_configuration().await;
        self.broadcast_status();
        if self.authorization_state() == AuthorizationState::Authorized
            && self.enabled_state() == EnabledState::Disabled
        {
            // Authorized but switched off, e.g. re-enabled in system settings.
            if let Err(e) = self.request_enabled(true) {
                warn!(error = %e, "unable to enable exposure notifications");
            }
        }
        self.schedule_if_needed()?;
        Ok(())
    }

    /// Deregisters the background task. Calling it on a stopped service does nothing.
    pub fn stop(&self) {
        if self.started.swap(false, Ordering::SeqCst) {
            self.scheduler.deregister(&self.task_identifier);
            info!(task = %self.task_identifier, "exposure service stopped");
        }
    }

    /// Submits the next background run if the platform is authorized.
    ///
    /// Returns whether a run was submitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler refuses the request.
    pub fn schedule_if_needed(&self) -> Result<bool, SchedulerError> {
        if self.platform.authorization_state() != AuthorizationState::Authorized {
            debug!("not authorized, background detection not scheduled");
            return Ok(false);
        }

        let earliest_begin = chrono::Duration::from_std(self.schedule_interval)
            .ok()
            .map(|delay| Utc::now() + delay);
        self.scheduler.submit(TaskRequest {
            identifier: self.task_identifier.clone(),
            requires_network_connectivity: true,
            earliest_begin,
        })?;
        debug!(?earliest_begin, "background detection scheduled");
        Ok(true)
    }

    /// Entry point for one host-initiated background run.
    ///
    /// Surfaces the radio advisory, runs detection under the host's
    /// cancellation token, schedules the next run and reports success.
    /// Without authorization nothing runs and the task reports failure.
    pub async fn handle_background_task(&self, cancel: CancellationToken) -> bool {
        self.notify_radio_off_if_needed();

        if self.authorization_state() != AuthorizationState::Authorized {
            warn!("not authorized, skipping exposure detection");
            return false;
        }

        let result = self.orchestrator.detect_exposures(&cancel).await;

        if let Err(e) = self.schedule_if_needed() {
            warn!(error = %e, "unable to schedule background task");
        }

        match result {
            Ok(outcome) => {
                debug!(processed = outcome.processed_file_count, "background task succeeded");
                true
            }
            Err(e) if e.is_processing_failure() => {
                warn!(error = %e, "background task failed");
                false
            }
            Err(e) => {
                debug!(error = %e, "background task ended early");
                false
            }
        }
    }

    /// Reacts to an authorization change reported by the platform.
    ///
    /// Runs already in progress are not interrupted.
    pub fn on_authorization_changed(&self) {
        self.broadcast_status();
        if let Err(e) = self.schedule_if_needed() {
            warn!(error = %e, "unable to schedule background task");
        }
    }

    /// Current authorization state.
    #[must_use]
    pub fn authorization_state(&self) -> AuthorizationState {
        self.platform.authorization_state()
    }

    /// Current enabled state.
    #[must_use]
    pub fn enabled_state(&self) -> EnabledState {
        self.platform.enabled_state()
    }

    /// Asks the platform to switch exposure notifications on or off and
    /// broadcasts the resulting status.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Platform`] if the platform refuses the change.
    /// Nothing is broadcast in that case.
    pub fn request_enabled(&self, enabled: bool) -> Result<EnabledState, ServiceError> {
        let state = self.platform.set_enabled(enabled)?;
        info!(enabled = %state, "exposure notification state changed");
        self.broadcast_status();
        Ok(state)
    }

    /// Posts or clears the radio-off advisory for the current platform state.
    ///
    /// Returns whether the advisory was posted.
    pub fn notify_radio_off_if_needed(&self) -> bool {
        notify_radio_off_if_needed(
            self.platform.as_ref(),
            self.orchestrator.collaborators().notifications.as_ref(),
        )
    }

    /// Subscribes to authorization/enabled status broadcasts.
    #[must_use]
    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusChange> {
        self.status.subscribe()
    }

    fn broadcast_status(&self) {
        let _ = self.status.send(StatusChange {
            authorization: self.authorization_state(),
            enabled: self.enabled_state(),
        });
    }

    /// Returns when the quota was last reset, i.e. the last detection attempt.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::DetectionNeverPerformed`] before the first attempt.
    pub fn last_detection_date(&self) -> Result<DateTime<Utc>, ServiceError> {
        self.orchestrator
            .store()
            .user_state()?
            .date_last_quota_reset
            .ok_or(ServiceError::DetectionNeverPerformed)
    }

    /// Returns every stored exposure as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns an error if the exposures cannot be read or serialized.
    pub fn current_exposures_json(&self) -> Result<String, ServiceError> {
        let exposures = self.orchestrator.store().exposures()?;
        Ok(serde_json::to_string(&exposures)?)
    }

    /// Replaces the persisted user state with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be written.
    pub fn reset_user_state(&self) -> Result<UserState, ServiceError> {
        Ok(self.orchestrator.store().reset_user_state()?)
    }
}

impl Drop for ExposureService {
    fn drop(&mut self) {
        self.stop();
    }
}
