// Event bus for seat lifecycle notifications.
// Observers (logging, metrics, the sim summary) subscribe; the registry publishes.

use std::time::Instant;

use crate::engine::{ActorHandle, PlayerId};
use crate::geometry::BlockPos;
use crate::registry::DeclineReason;

/// What happened to a seat
#[derive(Debug, Clone, PartialEq)]
pub enum SeatEvent {
    /// A player sat down
    Seated {
        player: PlayerId,
        seat: BlockPos,
        proxy: ActorHandle,
    },
    /// A session was torn down and the player moved back
    Released {
        player: PlayerId,
        seat: BlockPos,
        quitting: bool,
    },
    /// A session was torn down without moving the player (death)
    Discarded { player: PlayerId, seat: BlockPos },
    /// A sit attempt did not happen
    Declined {
        player: PlayerId,
        seat: BlockPos,
        reason: DeclineReason,
    },
}

impl SeatEvent {
    pub fn player(&self) -> PlayerId {
        match self {
            SeatEvent::Seated { player, .. }
            | SeatEvent::Released { player, .. }
            | SeatEvent::Discarded { player, .. }
            | SeatEvent::Declined { player, .. } => *player,
        }
    }
}

/// Event plus when it was created
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub event: SeatEvent,
    pub timestamp: Instant,
}

impl EventEnvelope {
    pub fn new(event: SeatEvent) -> Self {
        Self {
            event,
            timestamp: Instant::now(),
        }
    }
}

/// Broadcasts seat events to any number of subscribers
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: tokio::sync::broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new(capacity: usize) -> (Self, tokio::sync::broadcast::Receiver<EventEnvelope>) {
        let (sender, receiver) = tokio::sync::broadcast::channel(capacity.max(1));
        (EventBus { sender }, receiver)
    }

    /// Publish an event to the bus
    pub fn publish(&self, event: SeatEvent) {
        // Ignore errors if there are no subscribers
        let _ = self.sender.send(EventEnvelope::new(event));
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }
}

/// Logs every envelope it is handed
pub fn log_event(envelope: &EventEnvelope) {
    match &envelope.event {
        SeatEvent::Declined { .. } => {
            tracing::debug!(target: "events", "Seat Event: {:?}", envelope.event);
        }
        event => {
            tracing::info!(target: "events", "Seat Event: {:?}", event);
        }
    }
}
