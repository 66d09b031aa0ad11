//! Event emitter trait for supervisor lifecycle events.
//!
//! Implementations handle transport details (broadcast channels, logging,
//! a GUI event loop, ...).

use crate::events::SupervisorEvent;

/// Trait for emitting supervisor events.
///
/// This abstraction keeps channel types out of the supervisor's API surface.
///
/// # Implementations
///
/// - `NoopEmitter` - For tests and contexts without an observer
/// - `EventBroadcaster` in `warden-runtime` - Fan-out to any number of subscribers
pub trait EventEmitter: Send + Sync {
    /// Emit an event.
    ///
    /// This method must not block.
    fn emit(&self, event: SupervisorEvent);
}

/// A no-op event emitter that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    /// Create a new no-op emitter.
    pub const fn new() -> Self {
        Self
    }
}

impl EventEmitter for NoopEmitter {
    fn emit(&self, _event: SupervisorEvent) {}
}
