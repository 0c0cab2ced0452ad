//! Broadcast event bus for distributing `DraftEvent` to UI surfaces.
//!
//! Built on `tokio::sync::broadcast`. Publishing with no active
//! subscribers is a no-op, so the draft store can always publish.

use taskdraft_types::event::DraftEvent;
use tokio::sync::broadcast;

/// Multi-consumer bus for draft notifications.
///
/// Cloning the bus clones the sender, so every clone publishes into and
/// subscribes from the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DraftEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<DraftEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: DraftEvent) {
        let _ = self.sender.send(event);
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
