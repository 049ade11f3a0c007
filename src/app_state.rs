//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::ReadingEngine;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Every service of the reading engine.
    pub engine: Arc<ReadingEngine>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}

impl AppState {
    /// Wraps an engine; the bus is the one the engine publishes on.
    #[must_use]
    pub fn new(engine: ReadingEngine) -> Self {
        let event_bus = engine.event_bus().clone();
        Self {
            engine: Arc::new(engine),
            event_bus,
        }
    }
}
