//! State change broadcasting.

use keywatch_types::{Exposure, UserState};
use tokio::sync::broadcast;

/// A change to persisted state, carrying the full updated snapshot.
///
/// Consumers diff the snapshot against what they last saw instead of
/// subscribing to individual fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    /// The user state was written.
    UserState(UserState),
    /// The exposure list changed. Carries every stored exposure.
    Exposures(Vec<Exposure>),
}

/// Broadcast channel for [`StateChange`] events.
#[derive(Debug, Clone)]
pub struct StateEvents {
    sender: broadcast::Sender<StateChange>,
}

impl StateEvents {
    /// Number of events buffered per subscriber before lagging.
    pub const CAPACITY: usize = 32;

    /// Creates a new event channel.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(Self::CAPACITY);
        Self { sender }
    }

    /// Publishes a change. Having no subscribers is not an error.
    pub fn publish(&self, change: StateChange) {
        let _ = self.sender.send(change);
    }

    /// Subscribes to future changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.sender.subscribe()
    }
}

impl Default for StateEvents {
    fn default() -> Self {
        Self::new()
    }
}
