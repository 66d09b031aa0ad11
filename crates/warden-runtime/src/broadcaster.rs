//! Supervisor event broadcasting.
//!
//! Fans lifecycle events out to any number of observers (the CLI's event
//! printer, a future GUI) over a `tokio::sync::broadcast` channel.

use tokio::sync::broadcast;
use tracing::debug;
use warden_core::{EventEmitter, SupervisorEvent};

/// Broadcast channel capacity for supervisor events.
const CHANNEL_CAPACITY: usize = 64;

/// Broadcaster for supervisor lifecycle events.
///
/// Owned and injected; there is no process-wide instance.
#[derive(Debug)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<SupervisorEvent>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Broadcast an event to all current subscribers.
    pub fn broadcast(&self, event: SupervisorEvent) {
        if self.sender.receiver_count() > 0 {
            debug!(?event, "Broadcasting supervisor event");
            let _ = self.sender.send(event);
        }
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEmitter for EventBroadcaster {
    fn emit(&self, event: SupervisorEvent) {
        self.broadcast(event);
    }
}
