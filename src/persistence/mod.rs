//! Persistence layer: durable PostgreSQL records of the engine.
//!
//! The in-process registries serve every request. Each event that reaches
//! the [`crate::domain::EventBus`] journal is expanded into a
//! [`ChangeSet`] and handed to an [`EventSink`], which appends the event to
//! an audit log and upserts the records it touched. At startup
//! [`postgres::PostgresPersistence::load_state`] reads those records back
//! so [`crate::service::ReadingEngine::restore`] can rebuild the engine.

pub mod dispatcher;
pub mod postgres;

#[cfg(test)]
pub(crate) mod memory;

use std::future::Future;

use crate::error::GatewayError;
use crate::service::ChangeSet;

/// Destination for journaled changes.
pub trait EventSink: Send + Sync + 'static {
    /// Stores one change set. Storing the same change twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] when the write fails.
    fn store(&self, change: &ChangeSet) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

pub use dispatcher::{STORE_ATTEMPTS, spawn_dispatcher};
pub use postgres::PostgresPersistence;
