//! Event bus implementation using tokio broadcast channels

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::types::EventEnvelope;

/// Capacity for the broadcast channel
const DEFAULT_CAPACITY: usize = 1000;

/// Event bus for publishing and subscribing to events
///
/// Delivery is at-most-once to whoever is subscribed at publish time; there is
/// no replay.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    /// Number of events published, also the last assigned sequence number
    event_count: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            event_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish an event to all subscribers
    ///
    /// Stamps the envelope with the next sequence number. Returns the number
    /// of subscribers that received the event; with no subscribers the event
    /// is dropped and 0 is returned.
    pub fn publish(&self, mut envelope: EventEnvelope) -> usize {
        envelope.sequence = self.event_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Subscribe to every event
    ///
    /// Events published before subscribing will not be received.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Subscribe to the events of one session only
    pub fn subscribe_room(&self, session_id: Uuid) -> RoomReceiver {
        RoomReceiver {
            session_id,
            rx: self.sender.subscribe(),
        }
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the total number of events published
    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .field("event_count", &self.event_count())
            .finish()
    }
}

/// Receiver filtered to one session's room
pub struct RoomReceiver {
    session_id: Uuid,
    rx: broadcast::Receiver<EventEnvelope>,
}

impl RoomReceiver {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Wait for the next event of this room
    pub async fn recv(&mut self) -> Result<EventEnvelope, broadcast::error::RecvError> {
        loop {
            let envelope = self.rx.recv().await?;
            if envelope.event.session_id() == self.session_id {
                return Ok(envelope);
            }
        }
    }

    /// Take the next already-buffered event of this room, if any
    pub fn try_recv(&mut self) -> Result<EventEnvelope, broadcast::error::TryRecvError> {
        loop {
            let envelope = self.rx.try_recv()?;
            if envelope.event.session_id() == self.session_id {
                return Ok(envelope);
            }
        }
    }

    pub fn into_inner(self) -> broadcast::Receiver<EventEnvelope> {
        self.rx
    }
}
