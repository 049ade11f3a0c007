//! In-memory [`EventSink`] that folds change sets the way the database does.

use tokio::sync::Mutex;

use super::EventSink;
use crate::error::GatewayError;
use crate::service::{ChangeSet, StoredState};

#[derive(Debug, Default)]
struct Tables {
    events: Vec<&'static str>,
    state: StoredState,
    failures_left: usize,
}

/// Upserts records by key and counts stored events.
#[derive(Debug, Default)]
pub(crate) struct MemorySink {
    tables: Mutex<Tables>,
}

impl MemorySink {
    /// A sink whose first `count` writes fail.
    pub(crate) fn failing(count: usize) -> Self {
        Self {
            tables: Mutex::new(Tables {
                failures_left: count,
                ..Tables::default()
            }),
        }
    }

    /// Event types stored so far, in order.
    pub(crate) async fn event_types(&self) -> Vec<&'static str> {
        self.tables.lock().await.events.clone()
    }

    /// Copy of the stored records.
    pub(crate) async fn state(&self) -> StoredState {
        self.tables.lock().await.state.clone()
    }
}

impl EventSink for MemorySink {
    async fn store(&self, change: &ChangeSet) -> Result<(), GatewayError> {
        let mut tables = self.tables.lock().await;
        if tables.failures_left > 0 {
            tables.failures_left -= 1;
            return Err(GatewayError::PersistenceError("connection reset".to_string()));
        }
        tables.events.push(change.event.event_type_str());
        let state = &mut tables.state;

        if let Some(aggregate) = &change.aggregate {
            state
                .aggregates
                .retain(|a| a.event.id != aggregate.event.id);
            state.aggregates.push(aggregate.clone());
        }
        if let Some(check_in) = &change.check_in
            && !state.check_ins.iter().any(|c| c.id == check_in.id)
        {
            state.check_ins.push(check_in.clone());
        }
        if let Some(reward) = &change.reward
            && !state.rewards.iter().any(|r| r.id == reward.id)
        {
            state.rewards.push(reward.clone());
        }
        if let Some(quota) = &change.quota {
            state.quotas.retain(|q| q.key() != quota.key());
            state.quotas.push(quota.clone());
        }
        if let Some(snapshot) = &change.snapshot {
            state
                .snapshots
                .retain(|s| (s.event_id, s.date) != (snapshot.event_id, snapshot.date));
            state.snapshots.push(snapshot.clone());
        }
        if let Some(certificate) = &change.certificate {
            let held = state
                .certificates
                .iter()
                .any(|c| (c.event_id, c.rank) == (certificate.event_id, certificate.rank));
            if !held {
                state.certificates.push(certificate.clone());
            }
        }
        Ok(())
    }
}
