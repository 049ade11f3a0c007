//! Broadcast channel and transactional outbox for domain events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Services never
//! publish directly from inside a locked section: they stage events in an
//! [`Outbox`] and commit it after every guard has been released.
//!
//! Broadcast receivers that fall behind lose the oldest events. A bus built
//! with [`EventBus::with_journal`] also feeds every event into an unbounded
//! queue, so a durable consumer sees all of them in publication order.

use tokio::sync::{broadcast, mpsc};

use super::DomainEvent;

/// Broadcast bus for [`DomainEvent`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity
/// (default 10 000). When the ring buffer is full, the oldest events are
/// dropped for lagging receivers. The optional journal never drops.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
    journal: Option<mpsc::UnboundedSender<DomainEvent>>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            journal: None,
        }
    }

    /// Creates a bus that also appends every published event to a journal.
    ///
    /// The returned receiver yields each event exactly once, in order, no
    /// matter how far it falls behind the broadcast subscribers.
    #[must_use]
    pub fn with_journal(capacity: usize) -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (journal, rx) = mpsc::unbounded_channel();
        let mut bus = Self::new(capacity);
        bus.journal = Some(journal);
        (bus, rx)
    }

    /// Publishes an event to the journal, if any, and to all subscribers.
    ///
    /// Returns the number of broadcast receivers that received the event.
    /// If there are no active receivers, the broadcast copy is dropped.
    pub fn publish(&self, event: DomainEvent) -> usize {
        if let Some(journal) = &self.journal
            && journal.send(event.clone()).is_err()
        {
            tracing::warn!(
                event_type = event.event_type_str(),
                event_id = %event.event_id(),
                "event journal is closed, event will not be persisted"
            );
        }
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Returns `true` when published events are also journaled.
    #[must_use]
    pub const fn is_journaled(&self) -> bool {
        self.journal.is_some()
    }
}

/// Events staged by one atomic unit of work.
///
/// Dropping an outbox without committing discards its events, which is
/// what happens when an operation bails out with an error.
#[derive(Debug, Default)]
#[must_use = "staged events are lost unless the outbox is committed"]
pub struct Outbox {
    staged: Vec<DomainEvent>,
}

impl Outbox {
    /// Creates an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an event for publication.
    pub fn stage(&mut self, event: DomainEvent) {
        self.staged.push(event);
    }

    /// Number of staged events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// Returns `true` when nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Publishes every staged event in order. Returns how many were staged.
    pub fn commit(self, bus: &EventBus) -> usize {
        let count = self.staged.len();
        for event in self.staged {
            tracing::debug!(
                event_type = event.event_type_str(),
                event_id = %event.event_id(),
                "publishing domain event"
            );
            let _ = bus.publish(event);
        }
        count
    }
}
