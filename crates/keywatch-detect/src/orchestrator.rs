//! The exposure detection orchestrator.
//!
//! A run moves `Idle -> Running -> {Completed, Failed, Cancelled} -> Idle`.
//! Stages execute strictly in order and the cancellation token is checked at
//! every stage boundary. Persisted state is only touched by the quota refresh
//! at the start of a run and by the commit at its end.

use crate::{
    Advisory, Collaborators, DetectionConfig, DetectionError, QuotaTracker, SingleFlight,
    post_best_effort, select_targets,
};
use chrono::{Duration, Utc};
use keywatch_store::StateStore;
use keywatch_types::{
    Exposure, ExposureConfiguration, ExposureDetectionSummary, ExposureSummary, UnpackedArchives,
    start_of_day,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Error description recorded when the host's execution budget runs out.
pub const TIMED_OUT_DESCRIPTION: &str = "Background exposure detection timed out";

/// Lifecycle states of a detection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run in progress.
    Idle,
    /// A run holds the single-flight guard.
    Running,
    /// The run succeeded and its results are committed.
    Completed,
    /// The run failed; the error is recorded.
    Failed,
    /// The run was stopped by the host's deadline.
    Cancelled,
}

impl RunState {
    /// Returns the state as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a completed detection run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DetectionOutcome {
    /// Number of archives processed and charged against the quota.
    pub processed_file_count: usize,
    /// Exposures recorded by this run.
    pub new_exposures: Vec<Exposure>,
    /// Summary reported by the matching engine, if any.
    pub summary: Option<ExposureSummary>,
}

/// What the pipeline stages produced, before commit.
#[derive(Debug, Default)]
struct StageOutput {
    targets: Vec<String>,
    summary: Option<ExposureSummary>,
    exposures: Vec<Exposure>,
}

/// Runs exposure detection against the configured collaborators.
#[derive(Debug)]
pub struct DetectionOrchestrator {
    collaborators: Collaborators,
    quota: QuotaTracker,
    summary_retention: Duration,
    notify_on_error: bool,
    guard: SingleFlight,
    configuration: RwLock<ExposureConfiguration>,
}

impl DetectionOrchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(collaborators: Collaborators, config: &DetectionConfig) -> Self {
        Self {
            collaborators,
            quota: QuotaTracker::from_config(config),
            summary_retention: config.summary_retention(),
            notify_on_error: config.notify_on_error,
            guard: SingleFlight::new(),
            configuration: RwLock::new(ExposureConfiguration::placeholder()),
        }
    }

    /// Returns the persisted state store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.collaborators.store
    }

    /// Returns the collaborators this orchestrator drives.
    #[must_use]
    pub const fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Returns true while a run is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.guard.is_held()
    }

    /// Returns the last known matching configuration.
    pub async fn configuration(&self) -> ExposureConfiguration {
        self.configuration.read().await.clone()
    }

    /// Fetches the matching configuration ahead of the next run.
    ///
    /// Returns false and keeps the last known configuration on failure.
    pub async fn prefetch_configuration(&self) -> bool {
        match self.collaborators.configuration.fetch_configuration().await {
            Ok(configuration) => {
                *self.configuration.write().await = configuration;
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to prefetch exposure configuration");
                false
            }
        }
    }

    /// Runs one detection pass.
    ///
    /// Fails fast with [`DetectionError::AlreadyInProgress`] when another run
    /// holds the guard, without touching persisted state. Cancellation via
    /// `cancel` is observed at every stage boundary and surfaces as
    /// [`DetectionError::Cancelled`] with nothing committed.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the run.
    pub async fn detect_exposures(
        &self,
        cancel: &CancellationToken,
    ) -> Result<DetectionOutcome, DetectionError> {
        let Some(permit) = self.guard.try_acquire() else {
            debug!("exposure detection already in progress");
            return Err(DetectionError::AlreadyInProgress);
        };
        info!(state = %RunState::Running, "exposure detection started");

        let mut unpacked = None;
        let result = self.run_stages(cancel, &mut unpacked).await;
        let result = self.finish(result, cancel);

        if let Some(archives) = unpacked {
            if let Err(e) = archives.cleanup() {
                warn!(error = %e, "failed to remove unpacked key archives");
            }
        }

        permit.release();
        debug!(state = %RunState::Idle, "exposure detection guard released");
        result
    }

    /// Executes the pipeline stages in order. Unpacked archives are handed
    /// back through `unpacked` so the caller removes them on every path.
    async fn run_stages(
        &self,
        cancel: &CancellationToken,
        unpacked: &mut Option<UnpackedArchives>,
    ) -> Result<StageOutput, DetectionError> {
        let c = &self.collaborators;

        checkpoint(cancel)?;
        let state = self
            .quota
            .ensure_fresh_quota(c.store.as_ref(), Utc::now())?;
        if state.is_quota_exhausted() {
            info!(
                capacity = self.quota.daily_file_capacity(),
                "daily file processing capacity exhausted"
            );
            return Ok(StageOutput::default());
        }

        checkpoint(cancel)?;
        let remote_paths = c.index.fetch_index().await?;
        let targets = select_targets(
            &remote_paths,
            &state.last_processed_archive_path,
            state.remaining_daily_file_processing_capacity,
        );
        debug!(
            available = remote_paths.len(),
            targets = targets.len(),
            capacity = state.remaining_daily_file_processing_capacity,
            "selected key archives"
        );
        if targets.is_empty() {
            info!("no new key archives to process");
            return Ok(StageOutput::default());
        }

        let mut packages = Vec::with_capacity(targets.len());
        for path in &targets {
            checkpoint(cancel)?;
            packages.push(c.downloader.download(path).await?);
        }

        checkpoint(cancel)?;
        let archives = unpacked.insert(c.unpacker.unpack(packages).await?);
        let key_files = archives.key_files().to_vec();
        debug!(files = key_files.len(), "unpacked key archives");

        checkpoint(cancel)?;
        let configuration = self.matching_configuration().await;

        checkpoint(cancel)?;
        let summary = c.engine.detect(&configuration, &key_files).await?;

        checkpoint(cancel)?;
        let mut exposures = Vec::new();
        if let Some(summary) = &summary {
            if configuration.is_exposing(summary) {
                exposures = c
                    .engine
                    .exposure_info(summary)
                    .await?
                    .into_iter()
                    .map(Exposure::from_raw)
                    .collect();
            } else {
                debug!(
                    score = summary.maximum_risk_score,
                    threshold = configuration.minimum_risk_score,
                    "summary below score threshold"
                );
            }
        }

        Ok(StageOutput {
            targets,
            summary,
            exposures,
        })
    }

    /// Fetches the matching configuration, falling back to the last known copy.
    async fn matching_configuration(&self) -> ExposureConfiguration {
        match self.collaborators.configuration.fetch_configuration().await {
            Ok(configuration) => {
                *self.configuration.write().await = configuration.clone();
                configuration
            }
            Err(e) => {
                warn!(error = %e, "using last known exposure configuration");
                self.configuration.read().await.clone()
            }
        }
    }

    /// Moves the run to its terminal state and commits accordingly.
    fn finish(
        &self,
        result: Result<StageOutput, DetectionError>,
        cancel: &CancellationToken,
    ) -> Result<DetectionOutcome, DetectionError> {
        if cancel.is_cancelled() || matches!(result, Err(DetectionError::Cancelled)) {
            self.record_error(TIMED_OUT_DESCRIPTION);
            warn!(state = %RunState::Cancelled, "exposure detection cancelled");
            return Err(DetectionError::Cancelled);
        }

        match result.and_then(|output| self.commit(output)) {
            Ok(outcome) => {
                info!(
                    state = %RunState::Completed,
                    processed = outcome.processed_file_count,
                    new_exposures = outcome.new_exposures.len(),
                    "exposure detection completed"
                );
                Ok(outcome)
            }
            Err(e) => {
                let description = e.to_string();
                self.record_error(&description);
                if self.notify_on_error {
                    post_best_effort(
                        self.collaborators.notifications.as_ref(),
                        &Advisory::detection_error(Some(&description)),
                    );
                }
                error!(state = %RunState::Failed, error = %e, "exposure detection failed");
                Err(e)
            }
        }
    }

    /// Commits a successful run. Runs that targeted nothing leave state as is.
    fn commit(&self, output: StageOutput) -> Result<DetectionOutcome, DetectionError> {
        let processed = output.targets.len();
        if processed == 0 {
            return Ok(DetectionOutcome::default());
        }

        let store = self.collaborators.store.as_ref();
        let now = Utc::now();

        let summary = match &output.summary {
            Some(summary) => {
                let sequence = store.sequence_in_day(start_of_day(now))?;
                Some(ExposureDetectionSummary::new(summary, now, sequence))
            }
            None => None,
        };

        // Targets were clamped to the remaining capacity when selected.
        let consumed = u32::try_from(processed).unwrap_or(u32::MAX);
        let mut state = store.user_state()?;
        state.remaining_daily_file_processing_capacity = state
            .remaining_daily_file_processing_capacity
            .saturating_sub(consumed);
        if let Some(last) = output.targets.last() {
            state.last_processed_archive_path.clone_from(last);
        }
        state.last_detection_error_description = None;

        let pruned = store.commit_run(
            &state,
            &output.exposures,
            summary.as_ref(),
            now - self.summary_retention,
        )?;
        if pruned > 0 {
            debug!(pruned, "pruned expired detection summaries");
        }

        Ok(DetectionOutcome {
            processed_file_count: processed,
            new_exposures: output.exposures,
            summary: output.summary,
        })
    }

    /// Stores the description of the error that ended a run.
    fn record_error(&self, description: &str) {
        let store = self.collaborators.store.as_ref();
        let result = store.user_state().and_then(|mut state| {
            state.last_detection_error_description = Some(description.to_string());
            store.save_user_state(&state)
        });

        if let Err(e) = result {
            warn!(error = %e, "failed to record detection error");
        }
    }
}

/// Stops the run if the host has signalled expiration.
fn checkpoint(cancel: &CancellationToken) -> Result<(), DetectionError> {
    if cancel.is_cancelled() {
        return Err(DetectionError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Harness;
    use keywatch_types::{EngineError, FetchError, UnpackError, UserState};

    fn seeded(last: &str, capacity: u32) -> UserState {
        let mut state = UserState::new(capacity);
        state.last_processed_archive_path = last.to_string();
        state.date_last_quota_reset = Some(Utc::now() - Duration::hours(1));
        state
    }

    #[tokio::test]
    async fn test_resume_scenario() {
        let harness = Harness::new(&["a", "b", "c", "d"], seeded("b", 1));
        let orchestrator = harness.orchestrator();

        let outcome = orchestrator
            .detect_exposures(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.processed_file_count, 1);
        assert_eq!(harness.downloader.requested(), vec!["c".to_string()]);

        let state = harness.store.user_state().unwrap();
        assert_eq!(state.remaining_daily_file_processing_capacity, 0);
        assert_eq!(state.last_processed_archive_path, "c");
        assert!(state.last_detection_error_description.is_none());
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_zero_capacity_is_successful_noop() {
        let harness = Harness::new(&["a", "b"], seeded("a", 0));
        let orchestrator = harness.orchestrator();

        let outcome = orchestrator
            .detect_exposures(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, DetectionOutcome::default());
        assert_eq!(harness.index.calls(), 0);
        let state = harness.store.user_state().unwrap();
        assert_eq!(state.last_processed_archive_path, "a");
        assert_eq!(state.remaining_daily_file_processing_capacity, 0);
    }

    #[tokio::test]
    async fn test_cursor_at_end_makes_no_engine_call() {
        let harness = Harness::new(&["a", "b"], seeded("b", 5));
        let orchestrator = harness.orchestrator();

        let outcome = orchestrator
            .detect_exposures(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.processed_file_count, 0);
        assert_eq!(harness.engine.detect_calls(), 0);
        assert_eq!(
            harness
                .store
                .user_state()
                .unwrap()
                .remaining_daily_file_processing_capacity,
            5
        );
    }

    #[tokio::test]
    async fn test_expired_quota_is_reset_before_selection() {
        let mut state = seeded("", 0);
        state.date_last_quota_reset = Some(Utc::now() - Duration::hours(25));
        let paths: Vec<String> = (0..20).map(|i| format!("k{i:02}")).collect();
        let names: Vec<&str> = paths.iter().map(String::as_str).collect();
        let harness = Harness::new(&names, state);

        let outcome = harness
            .orchestrator()
            .detect_exposures(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.processed_file_count, 15);
        let state = harness.store.user_state().unwrap();
        assert_eq!(state.remaining_daily_file_processing_capacity, 0);
        assert_eq!(state.last_processed_archive_path, "k14");
    }

    #[tokio::test]
    async fn test_recent_quota_is_left_untouched() {
        let mut state = seeded("", 2);
        state.date_last_quota_reset = Some(Utc::now() - Duration::hours(23));
        let harness = Harness::new(&["a", "b", "c", "d"], state);

        let outcome = harness
            .orchestrator()
            .detect_exposures(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.processed_file_count, 2);
        assert_eq!(
            harness
                .store
                .user_state()
                .unwrap()
                .remaining_daily_file_processing_capacity,
            0
        );
    }

    #[tokio::test]
    async fn test_summary_at_threshold_is_not_exposing() {
        let harness = Harness::new(&["a"], seeded("", 15))
            .with_threshold(10)
            .with_summary(10, 2);

        let outcome = harness
            .orchestrator()
            .detect_exposures(&CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.new_exposures.is_empty());
        assert_eq!(harness.engine.info_calls(), 0);
        assert!(harness.store.exposures().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_above_threshold_records_exposures() {
        let harness = Harness::new(&["a"], seeded("", 15))
            .with_threshold(10)
            .with_summary(11, 2);

        let outcome = harness
            .orchestrator()
            .detect_exposures(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.new_exposures.len(), 2);
        assert_ne!(outcome.new_exposures[0].id, outcome.new_exposures[1].id);
        assert_eq!(harness.store.exposures().unwrap(), outcome.new_exposures);
        assert_eq!(harness.store.detection_summaries().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_download_failure_commits_nothing() {
        let initial = seeded("a", 15);
        let harness = Harness::new(&["a", "b", "c"], initial.clone()).with_failing_download("c");
        let orchestrator = harness.orchestrator();

        let err = orchestrator
            .detect_exposures(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DetectionError::Network(FetchError::ServerError { .. })));
        let state = harness.store.user_state().unwrap();
        assert_eq!(state.last_processed_archive_path, "a");
        assert_eq!(state.remaining_daily_file_processing_capacity, 15);
        assert_eq!(
            state.last_detection_error_description.as_deref(),
            Some(err.to_string().as_str())
        );
        assert_eq!(harness.engine.detect_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_state_write_does_not_duplicate_exposures() {
        let harness = Harness::new(&["a", "b"], seeded("", 15))
            .with_threshold(10)
            .with_summary(11, 2);
        let orchestrator = harness.orchestrator();

        harness.fail_next_state_write();
        let err = orchestrator
            .detect_exposures(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DetectionError::Store(_)));
        let state = harness.store.user_state().unwrap();
        assert_eq!(state.last_processed_archive_path, "");
        assert_eq!(state.remaining_daily_file_processing_capacity, 15);
        assert!(state.last_detection_error_description.is_some());
        assert!(harness.store.exposures().unwrap().is_empty());
        assert!(harness.store.detection_summaries().unwrap().is_empty());

        let outcome = orchestrator
            .detect_exposures(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.processed_file_count, 2);
        assert_eq!(harness.store.exposures().unwrap().len(), 2);
        assert_eq!(harness.store.detection_summaries().unwrap().len(), 1);
        let state = harness.store.user_state().unwrap();
        assert_eq!(state.last_processed_archive_path, "b");
        assert_eq!(state.remaining_daily_file_processing_capacity, 13);
        assert!(state.last_detection_error_description.is_none());
    }

    #[tokio::test]
    async fn test_engine_failure_posts_advisory_and_cleans_up() {
        let harness = Harness::new(&["a", "b"], seeded("", 15))
            .with_engine_error(EngineError::Detection("not authorized".into()));
        let orchestrator = harness.orchestrator_with(DetectionConfig {
            notify_on_error: true,
            ..DetectionConfig::default()
        });

        let err = orchestrator
            .detect_exposures(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DetectionError::Engine(_)));
        assert_eq!(
            harness.sink.posted_kinds(),
            vec![crate::AdvisoryKind::DetectionError]
        );
        let scratch = harness.unpacker.scratch_dir().unwrap();
        assert!(!scratch.exists());
        assert_eq!(
            harness.store.user_state().unwrap().last_processed_archive_path,
            ""
        );
    }

    #[tokio::test]
    async fn test_unpack_failure() {
        let harness = Harness::new(&["a"], seeded("", 15))
            .with_unpack_error(UnpackError::EmptyInput("a".into()));

        let err = harness
            .orchestrator()
            .detect_exposures(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DetectionError::Unpack(_)));
        assert!(harness.sink.posted_kinds().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_between_download_and_match() {
        let cancel = CancellationToken::new();
        let initial = seeded("a", 15);
        let harness =
            Harness::new(&["a", "b", "c"], initial).with_cancel_during_unpack(cancel.clone());
        let orchestrator = harness.orchestrator();

        let err = orchestrator.detect_exposures(&cancel).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(harness.downloader.requested().len(), 2);
        assert_eq!(harness.engine.detect_calls(), 0);
        let state = harness.store.user_state().unwrap();
        assert_eq!(state.last_processed_archive_path, "a");
        assert_eq!(state.remaining_daily_file_processing_capacity, 15);
        assert_eq!(
            state.last_detection_error_description.as_deref(),
            Some(TIMED_OUT_DESCRIPTION)
        );
        assert!(!harness.unpacker.scratch_dir().unwrap().exists());
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let harness = Harness::new(&["a"], seeded("", 15));

        let err = harness
            .orchestrator()
            .detect_exposures(&cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(harness.index.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_run_is_rejected_without_state_change() {
        let harness = Harness::new(&["a", "b"], seeded("", 15)).with_blocking_engine();
        let orchestrator = Arc::new(harness.orchestrator());

        let first = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                orchestrator
                    .detect_exposures(&CancellationToken::new())
                    .await
            })
        };
        harness.engine.wait_until_entered().await;

        let before = serde_json::to_string(&harness.store.user_state().unwrap()).unwrap();
        let err = orchestrator
            .detect_exposures(&CancellationToken::new())
            .await
            .unwrap_err();
        let after = serde_json::to_string(&harness.store.user_state().unwrap()).unwrap();

        assert!(matches!(err, DetectionError::AlreadyInProgress));
        assert_eq!(before, after);

        harness.engine.release();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome.processed_file_count, 2);
    }

    #[tokio::test]
    async fn test_configuration_falls_back_to_last_known() {
        let harness = Harness::new(&["a", "b"], seeded("", 15))
            .with_threshold(50)
            .with_summary(20, 1);
        let orchestrator = harness.orchestrator();

        assert!(orchestrator.prefetch_configuration().await);
        harness.configuration.fail();

        let outcome = orchestrator
            .detect_exposures(&CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.new_exposures.is_empty());
        assert_eq!(orchestrator.configuration().await.minimum_risk_score, 50);
    }

    #[tokio::test]
    async fn test_configuration_failure_uses_placeholder() {
        let harness = Harness::new(&["a"], seeded("", 15)).with_summary(1, 1);
        harness.configuration.fail();

        let outcome = harness
            .orchestrator()
            .detect_exposures(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.processed_file_count, 1);
        assert_eq!(outcome.new_exposures.len(), 1);
    }

    #[tokio::test]
    async fn test_success_clears_previous_error() {
        let mut state = seeded("", 15);
        state.last_detection_error_description = Some("old failure".to_string());
        let harness = Harness::new(&["a"], state);

        harness
            .orchestrator()
            .detect_exposures(&CancellationToken::new())
            .await
            .unwrap();

        assert!(
            harness
                .store
                .user_state()
                .unwrap()
                .last_detection_error_description
                .is_none()
        );
    }

    #[test]
    fn test_run_state_display() {
        assert_eq!(RunState::Cancelled.to_string(), "cancelled");
        assert_eq!(RunState::Idle.as_str(), "idle");
    }
}
