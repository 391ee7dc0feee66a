//! Public event surface for external subscribers.

use tokio::sync::broadcast;
use tracing::trace;

use crate::event::ChangeEvent;

const EMITTER_CAPACITY: usize = 256;

/// Re-broadcasts every session event to any number of subscribers.
///
/// Independent of the session's internal listener: a slow or absent
/// subscriber never affects dispatch.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<ChangeEvent>,
}

impl EventEmitter {
    /// Create an emitter with no subscribers.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EMITTER_CAPACITY);
        Self { tx }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Broadcast an event. Having no subscribers is not an error.
    pub fn emit(&self, event: ChangeEvent) {
        if self.tx.send(event).is_err() {
            trace!("no subscribers for session event");
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
