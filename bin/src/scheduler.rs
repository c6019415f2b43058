//! In-process host scheduler backing the daemon.

use keywatch_detect::{HostScheduler, SchedulerError, TaskRequest};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

/// Queues task requests for the daemon loop.
///
/// Requests for identifiers that were never registered are refused; requests
/// for identifiers deregistered after submission are dropped by
/// [`is_registered`](Self::is_registered) checks in the consumer.
#[derive(Debug)]
pub(crate) struct LocalScheduler {
    registered: Mutex<HashSet<String>>,
    requests: mpsc::UnboundedSender<TaskRequest>,
}

impl LocalScheduler {
    /// Creates a scheduler and the receiving end of its request queue.
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<TaskRequest>) {
        let (requests, rx) = mpsc::unbounded_channel();
        (
            Self {
                registered: Mutex::new(HashSet::new()),
                requests,
            },
            rx,
        )
    }

    pub(crate) fn is_registered(&self, identifier: &str) -> bool {
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(identifier)
    }
}

impl HostScheduler for LocalScheduler {
    fn register(&self, identifier: &str) -> Result<(), SchedulerError> {
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identifier.to_string());
        Ok(())
    }

    fn submit(&self, request: TaskRequest) -> Result<(), SchedulerError> {
        if !self.is_registered(&request.identifier) {
            return Err(SchedulerError::NotRegistered(request.identifier));
        }
        self.requests
            .send(request)
            .map_err(|_| SchedulerError::Unavailable("request queue closed".to_string()))
    }

    fn deregister(&self, identifier: &str) {
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identifier);
    }
}
