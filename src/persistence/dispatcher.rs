//! Background consumer that drains the event journal into an [`EventSink`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::EventSink;
use crate::domain::DomainEvent;
use crate::service::{ChangeSet, ReadingEngine};

/// Writes attempted per change set before it is given up.
pub const STORE_ATTEMPTS: u32 = 3;

const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Spawns a task that stores every event received on `journal`.
///
/// Each event is expanded into a [`ChangeSet`] against `engine` and written
/// with up to [`STORE_ATTEMPTS`] tries. A change that still fails is logged
/// and skipped. The task ends when every journal sender is gone.
pub fn spawn_dispatcher<S: EventSink>(
    engine: ReadingEngine,
    sink: Arc<S>,
    mut journal: mpsc::UnboundedReceiver<DomainEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = journal.recv().await {
            let change = engine.change_set(event).await;
            store_with_retry(sink.as_ref(), &change).await;
        }
        tracing::debug!("persistence dispatcher stopped");
    })
}

async fn store_with_retry<S: EventSink>(sink: &S, change: &ChangeSet) {
    let event = &change.event;
    for attempt in 1..=STORE_ATTEMPTS {
        match sink.store(change).await {
            Ok(()) => return,
            Err(e) if attempt < STORE_ATTEMPTS => {
                tracing::warn!(
                    event_type = event.event_type_str(),
                    event_id = %event.event_id(),
                    attempt,
                    error = %e,
                    "persisting domain event failed, retrying"
                );
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            Err(e) => {
                tracing::error!(
                    event_type = event.event_type_str(),
                    event_id = %event.event_id(),
                    error = %e,
                    "failed to persist domain event"
                );
            }
        }
    }
}
