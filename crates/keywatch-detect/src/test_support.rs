//! Hand-written collaborator fakes shared by the unit tests.

use crate::{
    Advisory, AdvisoryKind, ArchiveDownloader, ArchiveUnpacker, AuthorizationState, Collaborators,
    ConfigurationSource, DetectionConfig, DetectionOrchestrator, EnabledState, HostScheduler,
    MatchingEngine, NotificationSink, NotifyError, PlatformError, PlatformStatus,
    RemoteIndexSource, SchedulerError, TaskRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keywatch_store::{MemoryStateStore, StateChange, StateError, StateStore};
use keywatch_types::{
    DownloadedPackage, EngineError, Exposure, ExposureConfiguration, ExposureDetectionSummary,
    ExposureSummary, FetchError, RawExposure, UnpackError, UnpackedArchives, UserState,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub(crate) struct FakeIndex {
    paths: Vec<String>,
    calls: AtomicUsize,
}

impl FakeIndex {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteIndexSource for FakeIndex {
    async fn fetch_index(&self) -> Result<Vec<String>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.paths.clone())
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeDownloader {
    fail_on: Mutex<Option<String>>,
    requested: Mutex<Vec<String>>,
}

impl FakeDownloader {
    pub(crate) fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArchiveDownloader for FakeDownloader {
    async fn download(&self, path: &str) -> Result<DownloadedPackage, FetchError> {
        self.requested.lock().unwrap().push(path.to_string());
        if self.fail_on.lock().unwrap().as_deref() == Some(path) {
            return Err(FetchError::ServerError {
                url: path.to_string(),
                status: 500,
            });
        }
        Ok(DownloadedPackage::new(
            path.to_string(),
            path.as_bytes().to_vec().into(),
        ))
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeUnpacker {
    error: Mutex<Option<UnpackError>>,
    cancel: Mutex<Option<CancellationToken>>,
    scratch: Mutex<Option<PathBuf>>,
}

impl FakeUnpacker {
    pub(crate) fn scratch_dir(&self) -> Option<PathBuf> {
        self.scratch.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArchiveUnpacker for FakeUnpacker {
    async fn unpack(
        &self,
        packages: Vec<DownloadedPackage>,
    ) -> Result<UnpackedArchives, UnpackError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }

        let dir = tempfile::TempDir::new().map_err(UnpackError::ScratchDir)?;
        let mut files = Vec::new();
        for (i, package) in packages.iter().enumerate() {
            let file = dir.path().join(format!("{i}.bin"));
            std::fs::write(&file, &package.bytes).map_err(|e| UnpackError::Write {
                path: file.clone(),
                source: e,
            })?;
            files.push(file);
        }
        *self.scratch.lock().unwrap() = Some(dir.path().to_path_buf());

        if let Some(cancel) = self.cancel.lock().unwrap().as_ref() {
            cancel.cancel();
        }
        Ok(UnpackedArchives::new(dir, files))
    }
}

#[derive(Debug)]
pub(crate) struct FakeConfiguration {
    configuration: Mutex<ExposureConfiguration>,
    failing: AtomicBool,
}

impl FakeConfiguration {
    pub(crate) fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConfigurationSource for FakeConfiguration {
    async fn fetch_configuration(&self) -> Result<ExposureConfiguration, FetchError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Http("connection refused".to_string()));
        }
        Ok(self.configuration.lock().unwrap().clone())
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeEngine {
    summary: Mutex<Option<ExposureSummary>>,
    exposures: Mutex<Vec<RawExposure>>,
    error: Mutex<Option<EngineError>>,
    blocking: AtomicBool,
    entered: Notify,
    gate: Notify,
    detect_calls: AtomicUsize,
    info_calls: AtomicUsize,
}

impl FakeEngine {
    pub(crate) fn detect_calls(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    pub(crate) async fn wait_until_entered(&self) {
        self.entered.notified().await;
    }

    pub(crate) fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl MatchingEngine for FakeEngine {
    async fn detect(
        &self,
        _configuration: &ExposureConfiguration,
        _key_files: &[PathBuf],
    ) -> Result<Option<ExposureSummary>, EngineError> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        if self.blocking.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.gate.notified().await;
        }

        let error = self.error.lock().unwrap().clone();
        match error {
            Some(e) => Err(e),
            None => Ok(self.summary.lock().unwrap().clone()),
        }
    }

    async fn exposure_info(
        &self,
        _summary: &ExposureSummary,
    ) -> Result<Vec<RawExposure>, EngineError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.exposures.lock().unwrap().clone())
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    posted: Mutex<Vec<Advisory>>,
    cleared: Mutex<Vec<AdvisoryKind>>,
}

impl RecordingSink {
    pub(crate) fn posted_kinds(&self) -> Vec<AdvisoryKind> {
        self.posted.lock().unwrap().iter().map(|a| a.kind).collect()
    }

    pub(crate) fn cleared_kinds(&self) -> Vec<AdvisoryKind> {
        self.cleared.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn post(&self, advisory: &Advisory) -> Result<(), NotifyError> {
        self.posted.lock().unwrap().push(advisory.clone());
        Ok(())
    }

    fn clear(&self, kind: AdvisoryKind) -> Result<(), NotifyError> {
        self.cleared.lock().unwrap().push(kind);
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct FakePlatform {
    authorized: AtomicBool,
    radio: AtomicBool,
    enabled: AtomicBool,
    refuse_changes: AtomicBool,
    set_enabled_calls: AtomicUsize,
}

impl FakePlatform {
    pub(crate) const fn new(authorized: bool, radio: bool) -> Self {
        Self {
            authorized: AtomicBool::new(authorized),
            radio: AtomicBool::new(radio),
            enabled: AtomicBool::new(true),
            refuse_changes: AtomicBool::new(false),
            set_enabled_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_radio(&self, radio: bool) {
        self.radio.store(radio, Ordering::SeqCst);
    }

    pub(crate) fn disabled(self) -> Self {
        self.enabled.store(false, Ordering::SeqCst);
        self
    }

    pub(crate) fn refusing_changes(self) -> Self {
        self.refuse_changes.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn set_enabled_calls(&self) -> usize {
        self.set_enabled_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn set_authorized(&self, authorized: bool) {
        self.authorized.store(authorized, Ordering::SeqCst);
    }
}

impl PlatformStatus for FakePlatform {
    fn authorization_state(&self) -> AuthorizationState {
        if self.authorized.load(Ordering::SeqCst) {
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
        self.radio.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) -> Result<EnabledState, PlatformError> {
        self.set_enabled_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse_changes.load(Ordering::SeqCst) {
            return Err(PlatformError::CannotEnableNotifications(
                "radio unavailable".to_string(),
            ));
        }
        self.enabled.store(enabled, Ordering::SeqCst);
        Ok(self.enabled_state())
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeScheduler {
    registered: Mutex<Vec<String>>,
    submitted: Mutex<Vec<TaskRequest>>,
    deregistered: Mutex<Vec<String>>,
}

impl FakeScheduler {
    pub(crate) fn registered(&self) -> Vec<String> {
        self.registered.lock().unwrap().clone()
    }

    pub(crate) fn submitted(&self) -> Vec<TaskRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub(crate) fn deregistered(&self) -> Vec<String> {
        self.deregistered.lock().unwrap().clone()
    }
}

impl HostScheduler for FakeScheduler {
    fn register(&self, identifier: &str) -> Result<(), SchedulerError> {
        self.registered.lock().unwrap().push(identifier.to_string());
        Ok(())
    }

    fn submit(&self, request: TaskRequest) -> Result<(), SchedulerError> {
        if !self.registered.lock().unwrap().contains(&request.identifier) {
            return Err(SchedulerError::NotRegistered(request.identifier));
        }
        self.submitted.lock().unwrap().push(request);
        Ok(())
    }

    fn deregister(&self, identifier: &str) {
        self.deregistered.lock().unwrap().push(identifier.to_string());
    }
}

/// Delegates to a [`MemoryStateStore`] but can be told to fail the next
/// write that carries the user state.
#[derive(Debug)]
pub(crate) struct FaultyStore {
    inner: Arc<MemoryStateStore>,
    fail_next_state_write: AtomicBool,
}

impl FaultyStore {
    fn state_write_fault(&self) -> keywatch_store::Result<()> {
        if self.fail_next_state_write.swap(false, Ordering::SeqCst) {
            return Err(StateError::WriteFile {
                path: PathBuf::from("user_state.json"),
                source: std::io::Error::other("disk full"),
            });
        }
        Ok(())
    }
}

impl StateStore for FaultyStore {
    fn user_state(&self) -> keywatch_store::Result<UserState> {
        self.inner.user_state()
    }

    fn save_user_state(&self, state: &UserState) -> keywatch_store::Result<()> {
        self.state_write_fault()?;
        self.inner.save_user_state(state)
    }

    fn reset_user_state(&self) -> keywatch_store::Result<UserState> {
        self.state_write_fault()?;
        self.inner.reset_user_state()
    }

    fn exposures(&self) -> keywatch_store::Result<Vec<Exposure>> {
        self.inner.exposures()
    }

    fn append_exposures(&self, exposures: &[Exposure]) -> keywatch_store::Result<()> {
        self.inner.append_exposures(exposures)
    }

    fn detection_summaries(&self) -> keywatch_store::Result<Vec<ExposureDetectionSummary>> {
        self.inner.detection_summaries()
    }

    fn append_detection_summary(
        &self,
        summary: &ExposureDetectionSummary,
    ) -> keywatch_store::Result<()> {
        self.inner.append_detection_summary(summary)
    }

    fn prune_detection_summaries(&self, cutoff: DateTime<Utc>) -> keywatch_store::Result<usize> {
        self.inner.prune_detection_summaries(cutoff)
    }

    fn commit_run(
        &self,
        state: &UserState,
        exposures: &[Exposure],
        summary: Option<&ExposureDetectionSummary>,
        prune_cutoff: DateTime<Utc>,
    ) -> keywatch_store::Result<usize> {
        self.state_write_fault()?;
        self.inner.commit_run(state, exposures, summary, prune_cutoff)
    }

    fn subscribe(&self) -> tokio::sync::broadcast::Receiver<StateChange> {
        self.inner.subscribe()
    }
}

/// A full set of fakes around an in-memory store.
#[derive(Debug)]
pub(crate) struct Harness {
    pub(crate) store: Arc<MemoryStateStore>,
    faulty: Arc<FaultyStore>,
    pub(crate) index: Arc<FakeIndex>,
    pub(crate) downloader: Arc<FakeDownloader>,
    pub(crate) unpacker: Arc<FakeUnpacker>,
    pub(crate) configuration: Arc<FakeConfiguration>,
    pub(crate) engine: Arc<FakeEngine>,
    pub(crate) sink: Arc<RecordingSink>,
}

impl Harness {
    pub(crate) fn new(paths: &[&str], state: UserState) -> Self {
        let store = Arc::new(MemoryStateStore::with_user_state(state));
        Self {
            faulty: Arc::new(FaultyStore {
                inner: store.clone(),
                fail_next_state_write: AtomicBool::new(false),
            }),
            store,
            index: Arc::new(FakeIndex {
                paths: paths.iter().map(|p| (*p).to_string()).collect(),
                calls: AtomicUsize::new(0),
            }),
            downloader: Arc::new(FakeDownloader::default()),
            unpacker: Arc::new(FakeUnpacker::default()),
            configuration: Arc::new(FakeConfiguration {
                configuration: Mutex::new(ExposureConfiguration::placeholder()),
                failing: AtomicBool::new(false),
            }),
            engine: Arc::new(FakeEngine::default()),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    pub(crate) fn with_threshold(self, minimum_risk_score: u32) -> Self {
        self.configuration
            .configuration
            .lock()
            .unwrap()
            .minimum_risk_score = minimum_risk_score;
        self
    }

    pub(crate) fn with_summary(self, score: u32, exposure_count: usize) -> Self {
        *self.engine.summary.lock().unwrap() = Some(ExposureSummary {
            days_since_last_exposure: 1,
            matched_key_count: exposure_count as u64,
            maximum_risk_score: score,
            attenuation_durations: vec![Duration::from_secs(300)],
        });
        *self.engine.exposures.lock().unwrap() = (0..exposure_count)
            .map(|i| RawExposure {
                date: Utc::now(),
                duration: Duration::from_secs(300 * (i as u64 + 1)),
                total_risk_score: score,
                transmission_risk_level: 1,
            })
            .collect();
        self
    }

    pub(crate) fn with_engine_error(self, error: EngineError) -> Self {
        *self.engine.error.lock().unwrap() = Some(error);
        self
    }

    pub(crate) fn with_blocking_engine(self) -> Self {
        self.engine.blocking.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_failing_download(self, path: &str) -> Self {
        *self.downloader.fail_on.lock().unwrap() = Some(path.to_string());
        self
    }

    pub(crate) fn with_unpack_error(self, error: UnpackError) -> Self {
        *self.unpacker.error.lock().unwrap() = Some(error);
        self
    }

    pub(crate) fn with_cancel_during_unpack(self, cancel: CancellationToken) -> Self {
        *self.unpacker.cancel.lock().unwrap() = Some(cancel);
        self
    }

    /// Makes the next user state write fail once.
    pub(crate) fn fail_next_state_write(&self) {
        self.faulty
            .fail_next_state_write
            .store(true, Ordering::SeqCst);
    }

    pub(crate) fn collaborators(&self) -> Collaborators {
        Collaborators {
            index: self.index.clone(),
            downloader: self.downloader.clone(),
            unpacker: self.unpacker.clone(),
            configuration: self.configuration.clone(),
            engine: self.engine.clone(),
            store: self.faulty.clone(),
            notifications: self.sink.clone(),
        }
    }

    pub(crate) fn orchestrator(&self) -> DetectionOrchestrator {
        self.orchestrator_with(DetectionConfig {
            notify_on_error: false,
            ..DetectionConfig::default()
        })
    }

    pub(crate) fn orchestrator_with(&self, config: DetectionConfig) -> DetectionOrchestrator {
        DetectionOrchestrator::new(self.collaborators(), &config)
    }
}
