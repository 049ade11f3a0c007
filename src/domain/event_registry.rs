//! Concurrent event storage with per-event fine-grained locking.
//!
//! [`EventRegistry`] stores every event aggregate in a `HashMap` where each
//! entry is individually protected by a [`tokio::sync::RwLock`]. Work on
//! different events never contends; work on the same event is serialized
//! only where it mutates the aggregate.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::event_entry::{EventEntry, EventSummary};
use super::{EventId, EventStatus};
use crate::error::GatewayError;

/// Central store for all event aggregates.
///
/// # Concurrency
///
/// - Multiple tasks may read the same event concurrently.
/// - Writes to different events are concurrent.
/// - Writes to the same event are serialized.
#[derive(Debug)]
pub struct EventRegistry {
    events: RwLock<HashMap<EventId, Arc<RwLock<EventEntry>>>>,
}

impl EventRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a new event aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StateConflict`] if an event with the same id
    /// already exists (should never happen with UUID v4).
    pub async fn insert(&self, entry: EventEntry) -> Result<EventId, GatewayError> {
        let event_id = entry.id();
        let mut map = self.events.write().await;
        if map.contains_key(&event_id) {
            return Err(GatewayError::StateConflict(format!(
                "event {event_id} already exists"
            )));
        }
        map.insert(event_id, Arc::new(RwLock::new(entry)));
        Ok(event_id)
    }

    /// Returns the aggregate behind its per-event lock.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if no event has the given id.
    pub async fn get(&self, event_id: EventId) -> Result<Arc<RwLock<EventEntry>>, GatewayError> {
        let map = self.events.read().await;
        map.get(&event_id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found("event", event_id))
    }

    /// Returns summaries of all events, optionally filtered by status,
    /// ordered by start date.
    pub async fn list(&self, status_filter: Option<EventStatus>) -> Vec<EventSummary> {
        let entries: Vec<Arc<RwLock<EventEntry>>> =
            self.events.read().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(entries.len());
        for entry_lock in entries {
            let entry = entry_lock.read().await;
            if let Some(filter) = status_filter
                && entry.event.status != filter
            {
                continue;
            }
            summaries.push(EventSummary::from(&*entry));
        }
        summaries.sort_by(|a, b| {
            a.start_date
                .cmp(&b.start_date)
                .then(a.event_id.cmp(&b.event_id))
        });
        summaries
    }

    /// 1-based position of `event_id` in the review queue (oldest first).
    ///
    /// Returns `None` when the event is not awaiting review.
    pub async fn review_queue_position(&self, event_id: EventId) -> Option<usize> {
        let entries: Vec<Arc<RwLock<EventEntry>>> =
            self.events.read().await.values().cloned().collect();
        let mut queue = Vec::new();
        for entry_lock in entries {
            let entry = entry_lock.read().await;
            if entry.event.is_awaiting_review()
                && let Some(submitted_at) = entry.event.submitted_at
            {
                queue.push((submitted_at, entry.event.id));
            }
        }
        queue.sort();
        queue
            .iter()
            .position(|(_, id)| *id == event_id)
            .map(|index| index + 1)
    }

    /// Returns the number of events in the registry.
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Returns `true` if the registry contains no events.
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::event::tests::{date, draft};
    use crate::domain::{Event, UserId};
    use chrono::Utc;

    fn make_entry() -> EventEntry {
        EventEntry::new(Event::from_draft(
            draft(date(2026, 3, 2), date(2026, 3, 8)),
            UserId::new(),
            Utc::now(),
        ))
    }

    #[tokio::test]
    async fn insert_and_get() {
        let registry = EventRegistry::new();
        let entry = make_entry();
        let id = entry.id();

        let Ok(inserted) = registry.insert(entry).await else {
            panic!("insert failed");
        };
        assert_eq!(inserted, id);
        assert!(registry.get(id).await.is_ok());
    }

    #[tokio::test]
    async fn get_nonexistent_returns_not_found() {
        let registry = EventRegistry::new();
        let result = registry.get(EventId::new()).await;
        let Err(GatewayError::NotFound { .. }) = result else {
            panic!("expected not found");
        };
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let registry = EventRegistry::new();
        let _ = registry.insert(make_entry()).await;
        let _ = registry.insert(make_entry()).await;

        assert_eq!(registry.list(None).await.len(), 2);
        assert_eq!(registry.list(Some(EventStatus::Draft)).await.len(), 2);
        assert!(registry.list(Some(EventStatus::Completed)).await.is_empty());
    }

    #[tokio::test]
    async fn review_queue_orders_by_submission_time() {
        let registry = EventRegistry::new();
        let now = Utc::now();
        let mut first = make_entry();
        first.event.submitted_at = Some(now);
        let mut second = make_entry();
        second.event.submitted_at = Some(now + chrono::Duration::seconds(5));
        let unsubmitted = make_entry();

        let (Ok(a), Ok(b), Ok(c)) = (
            registry.insert(first).await,
            registry.insert(second).await,
            registry.insert(unsubmitted).await,
        ) else {
            panic!("insert failed");
        };
        assert_eq!(registry.review_queue_position(a).await, Some(1));
        assert_eq!(registry.review_queue_position(b).await, Some(2));
        assert_eq!(registry.review_queue_position(c).await, None);
    }

    #[tokio::test]
    async fn len_and_is_empty() {
        let registry = EventRegistry::new();
        assert!(registry.is_empty().await);
        let _ = registry.insert(make_entry()).await;
        assert_eq!(registry.len().await, 1);
    }
}
