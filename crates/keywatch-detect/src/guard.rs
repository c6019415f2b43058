//! Single-flight guard for detection runs.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Allows at most one holder at a time. Contention fails fast instead of queueing.
///
/// The guard lives in process memory only; it does not survive restarts.
#[derive(Debug, Clone)]
pub struct SingleFlight {
    permits: Arc<Semaphore>,
}

impl SingleFlight {
    /// Creates an unheld guard.
    #[must_use]
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    /// Acquires the guard, or returns `None` if it is already held.
    #[must_use]
    pub fn try_acquire(&self) -> Option<SingleFlightPermit> {
        Arc::clone(&self.permits)
            .try_acquire_owned()
            .ok()
            .map(|permit| SingleFlightPermit { _permit: permit })
    }

    /// Returns true while a permit is outstanding.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.permits.available_permits() == 0
    }
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof of holding a [`SingleFlight`] guard. Released when dropped.
#[derive(Debug)]
#[must_use = "the guard is released as soon as the permit is dropped"]
pub struct SingleFlightPermit {
    _permit: OwnedSemaphorePermit,
}

impl SingleFlightPermit {
    /// Releases the guard.
    pub fn release(self) {
        drop(self);
    }
}
