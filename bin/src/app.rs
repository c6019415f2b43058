//! Wires configuration into a running exposure service.

use crate::config::KeywatchConfig;
use crate::engine::DryRunEngine;
use crate::platform::StaticPlatform;
use crate::scheduler::LocalScheduler;
use anyhow::{Context, Result};
use keywatch_detect::{
    Collaborators, DetectionOrchestrator, ExposureService, LogNotificationSink, TaskRequest,
};
use keywatch_fetch::{KeyServerClient, ZipUnpacker};
use keywatch_store::StateManager;
use std::sync::Arc;
use tokio::sync::mpsc;

/// The service and the pieces the CLI drives directly.
#[derive(Debug)]
pub(crate) struct App {
    pub(crate) service: ExposureService,
    pub(crate) scheduler: Arc<LocalScheduler>,
    pub(crate) requests: mpsc::UnboundedReceiver<TaskRequest>,
}

impl App {
    /// Builds the orchestrator, its collaborators and the service around it.
    pub(crate) fn build(config: &KeywatchConfig) -> Result<Self> {
        let state_dir = config.state_dir();
        let store = StateManager::new(state_dir.clone())
            .with_context(|| format!("Failed to open state directory {}", state_dir.display()))?
            .with_daily_file_capacity(config.detection.daily_file_capacity);

        let client = Arc::new(
            KeyServerClient::new(config.client.clone())
                .context("Failed to create key server client")?,
        );

        let collaborators = Collaborators {
            index: client.clone(),
            downloader: client.clone(),
            unpacker: Arc::new(ZipUnpacker::new()),
            configuration: client,
            engine: Arc::new(DryRunEngine),
            store: Arc::new(store),
            notifications: Arc::new(LogNotificationSink),
        };
        let orchestrator = Arc::new(DetectionOrchestrator::new(collaborators, &config.detection));

        let (scheduler, requests) = LocalScheduler::new();
        let scheduler = Arc::new(scheduler);
        let platform = Arc::new(StaticPlatform::from_config(&config.platform));
        let service = ExposureService::new(
            orchestrator,
            scheduler.clone(),
            platform,
            &config.detection,
        );

        Ok(Self {
            service,
            scheduler,
            requests,
        })
    }
}
